//! External command runner
//!
//! Runs a user-supplied program once per target. The program receives the
//! target through argument placeholders and environment variables, does
//! whatever it takes to execute the suite there, and prints a JSON report on
//! stdout:
//!
//! ```json
//! {
//!   "name": "Pixel 8",
//!   "tests": [
//!     { "class": "com.example.LoginTest", "method": "testLogin", "status": "pass",
//!       "duration_ms": 812, "screenshots": ["shots/login.png"] }
//!   ]
//! }
//! ```
//!
//! Relative artifact paths are resolved against the target's output directory.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::models::{Fault, TargetId, TargetRunOutcome, TestIdentity, TestResult, TestStatus};
use crate::utils::timer::Timer;

use super::runner::{TargetContext, TargetRunner};

const LOG_FILE: &str = "runner.log";

/// Report printed by the external program
#[derive(Debug, Deserialize)]
struct TargetReport {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    duration_ms: Option<u64>,
    #[serde(default)]
    tests: Vec<ReportedTest>,
}

#[derive(Debug, Deserialize)]
struct ReportedTest {
    class: String,
    method: String,
    status: TestStatus,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    failure: Option<String>,
    #[serde(default)]
    screenshots: Vec<PathBuf>,
    #[serde(default)]
    animated_gif: Option<PathBuf>,
}

impl TargetReport {
    fn into_outcome(
        self,
        target: TargetId,
        output_dir: &Path,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
    ) -> TargetRunOutcome {
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { output_dir.join(p) };

        let mut outcome = TargetRunOutcome::new(target)
            .with_started_at(self.started_at.unwrap_or(started_at))
            .with_duration_ms(self.duration_ms.unwrap_or(elapsed_ms));
        outcome.name = self.name;

        for test in self.tests {
            let result = TestResult {
                status: test.status,
                duration_ms: test.duration_ms,
                failure: test.failure,
                screenshots: test.screenshots.into_iter().map(resolve).collect(),
                animated_gif: test.animated_gif.map(resolve),
            };
            outcome.record(TestIdentity::new(test.class, test.method), result);
        }
        outcome
    }
}

/// Runs an external program per target
#[derive(Clone, Debug)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments may contain `{target}`, `{output}`, `{app}`, `{suite}`,
    /// `{app_package}` and `{suite_package}`
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn expand(&self, arg: &str, ctx: &TargetContext) -> String {
        arg.replace("{target}", ctx.target.as_str())
            .replace("{output}", &ctx.output_dir.to_string_lossy())
            .replace("{app_package}", &ctx.suite_info.application_package)
            .replace("{suite_package}", &ctx.suite_info.suite_package)
            .replace("{app}", &ctx.application.to_string_lossy())
            .replace("{suite}", &ctx.suite.to_string_lossy())
    }

    async fn run(&self, ctx: &TargetContext) -> Result<TargetRunOutcome, Fault> {
        let args: Vec<String> = self.args.iter().map(|a| self.expand(a, ctx)).collect();
        debug!("{}: {} {}", ctx.target, self.program, args.join(" "));

        let timer = Timer::start(format!("runner on {}", ctx.target));
        let started_at = timer.started_at();

        let output = Command::new(&self.program)
            .args(&args)
            .env("FANRUN_TARGET", ctx.target.as_str())
            .env("FANRUN_OUTPUT", &ctx.output_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Fault::execution(format!("failed to launch {}: {e}", self.program)))?;
        let elapsed_ms = timer.stop().as_millis() as u64;

        let log = ctx.output_dir.join(LOG_FILE);
        if let Err(e) = tokio::fs::write(&log, &output.stderr).await {
            warn!("Unable to write {}: {}", log.display(), e);
        }

        let report: TargetReport = match serde_json::from_slice(&output.stdout) {
            Ok(report) => report,
            Err(_) if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let last = stderr.lines().last().unwrap_or_default();
                return Err(Fault::execution(format!(
                    "{} exited with {}: {}",
                    self.program, output.status, last
                )));
            }
            Err(e) => {
                return Err(Fault::execution(format!(
                    "invalid report from {}: {e}",
                    self.program
                )))
            }
        };

        if !output.status.success() {
            warn!(
                "{} exited with {} on {} but produced a report",
                self.program, output.status, ctx.target
            );
        }

        Ok(report.into_outcome(ctx.target.clone(), &ctx.output_dir, started_at, elapsed_ms))
    }
}

impl TargetRunner for CommandRunner {
    fn run_on_target<'a>(
        &'a self,
        ctx: &'a TargetContext,
    ) -> BoxFuture<'a, Result<TargetRunOutcome, Fault>> {
        self.run(ctx).boxed()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executor::SuiteInfo;
    use tempfile::{tempdir, TempDir};

    fn context(dir: &TempDir, target: &str) -> TargetContext {
        TargetContext {
            target: TargetId::new(target),
            output_dir: dir.path().to_path_buf(),
            application: PathBuf::from("/apks/app.apk"),
            suite: PathBuf::from("/apks/tests.apk"),
            suite_info: SuiteInfo {
                application_package: "com.example".into(),
                suite_package: "com.example.test".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_parses_report() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("report.json");
        std::fs::write(
            &report,
            r#"{
                "name": "Pixel 8",
                "tests": [
                    {"class": "C", "method": "m1", "status": "pass", "duration_ms": 12,
                     "screenshots": ["shots/one.png"]},
                    {"class": "C", "method": "m2", "status": "fail", "failure": "boom"}
                ]
            }"#,
        )
        .unwrap();

        let runner = CommandRunner::new("sh").with_args([
            "-c".to_string(),
            "cat \"$1\"".to_string(),
            "sh".to_string(),
            report.to_string_lossy().into_owned(),
        ]);
        let outcome = runner.run(&context(&dir, "dev1")).await.unwrap();

        assert_eq!(outcome.target, TargetId::new("dev1"));
        assert_eq!(outcome.name.as_deref(), Some("Pixel 8"));
        assert_eq!(outcome.tests_started, 2);
        assert_eq!(outcome.tests_failed, 1);
        let m1 = &outcome.tests[&TestIdentity::new("C", "m1")];
        assert_eq!(m1.screenshots, vec![dir.path().join("shots/one.png")]);
        assert!(outcome.started_at.is_some());
    }

    #[tokio::test]
    async fn test_exports_target_env() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new("sh").with_args([
            "-c",
            r#"printf '{"name":"%s","tests":[]}' "$FANRUN_TARGET""#,
        ]);

        let outcome = runner.run(&context(&dir, "emulator-5554")).await.unwrap();
        assert_eq!(outcome.name.as_deref(), Some("emulator-5554"));
        assert_eq!(outcome.tests_started, 0);
    }

    #[tokio::test]
    async fn test_failed_command_is_fault() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new("sh").with_args([
            "-c",
            "echo \"no device $1\" >&2; exit 3",
            "sh",
            "{target}",
        ]);

        let fault = runner.run(&context(&dir, "dev9")).await.unwrap_err();
        assert!(matches!(&fault, Fault::Execution(m) if m.contains("no device dev9")));

        let log = std::fs::read_to_string(dir.path().join(LOG_FILE)).unwrap();
        assert!(log.contains("no device dev9"));
    }

    #[tokio::test]
    async fn test_missing_program_is_fault() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new("/definitely/not/a/program");
        let fault = runner.run(&context(&dir, "dev1")).await.unwrap_err();
        assert!(matches!(fault, Fault::Execution(_)));
    }

    #[test]
    fn test_expand_placeholders() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new("run");
        let ctx = context(&dir, "dev1");
        assert_eq!(
            runner.expand("{target}:{app_package}:{suite}", &ctx),
            "dev1:com.example:/apks/tests.apk"
        );
        assert_eq!(runner.expand("{app}", &ctx), "/apks/app.apk");
    }
}
