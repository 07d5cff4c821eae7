//! Report model construction
//!
//! Turns a frozen [`ExecutionSummary`] into view nodes a renderer can walk
//! without doing any arithmetic or formatting of its own. The conversion is
//! pure: same summary in, same model out.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::models::{
    ExecutionSummary, TargetId, TargetRunOutcome, TestIdentity, TestResult, TestStatus,
};
use crate::utils::timer::{format_display_time, format_elapsed, plural};

/// Top-level view of a whole run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportModel {
    pub run_id: String,
    pub title: String,
    pub started: String,
    pub completed: String,
    pub elapsed: String,
    pub total_targets: usize,
    pub total_tests: u32,
    pub total_success: u32,
    pub total_failure: u32,
    pub total_faults: u32,
    pub success: bool,
    pub exception: Option<String>,
    pub targets: Vec<TargetView>,
    pub classes: Vec<ClassView>,
}

/// One target's page
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetView {
    pub target: String,
    /// Directory under the output root holding this target's files
    pub dir: String,
    pub name: String,
    pub tests_run: String,
    pub tests_passed: u32,
    pub tests_failed: u32,
    pub elapsed: String,
    pub started: Option<String>,
    pub fault: Option<String>,
    /// Sorted by class name, then method name
    pub tests: Vec<TestView>,
}

/// One test as seen on one target
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestView {
    pub target: String,
    pub class_name: String,
    pub method_name: String,
    pub class_simple_name: String,
    pub pretty_method_name: String,
    pub test_id: String,
    pub status: String,
    pub duration_ms: u64,
    pub screenshots: Vec<String>,
    pub animated_gif: Option<String>,
    pub failure: Option<StackTrace>,
}

/// One class with its tests merged across targets
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassView {
    pub class_name: String,
    pub class_simple_name: String,
    /// Sorted by method name
    pub tests: Vec<ClassTestView>,
}

/// One logical test with every target's result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassTestView {
    pub method_name: String,
    pub pretty_method_name: String,
    pub test_id: String,
    pub passed_on: usize,
    pub failed_on: usize,
    /// Sorted by target id
    pub results: Vec<TestView>,
}

/// Failure text split into its headline and the remaining lines
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTrace {
    pub title: String,
    pub lines: Vec<String>,
}

impl ReportModel {
    pub fn from_summary(summary: &ExecutionSummary) -> Self {
        let targets = summary
            .outcomes
            .iter()
            .map(|outcome| TargetView::from_outcome(outcome, &summary.output_dir))
            .collect();

        let classes = summary
            .classes
            .values()
            .map(|class| ClassView {
                class_name: class.class_name.clone(),
                class_simple_name: class_simple_name(&class.class_name).to_string(),
                tests: class
                    .tests
                    .values()
                    .map(|node| ClassTestView {
                        method_name: node.identity.method_name.clone(),
                        pretty_method_name: prettify_method_name(&node.identity.method_name),
                        test_id: test_id(&node.identity),
                        passed_on: node.passed_on(),
                        failed_on: node.failed_on(),
                        results: node
                            .results
                            .iter()
                            .map(|(target, result)| {
                                TestView::new(target, &node.identity, result, &summary.output_dir)
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            run_id: summary.run_id.clone(),
            title: summary.title.clone(),
            started: format_display_time(&summary.started_at),
            completed: format_display_time(&summary.ended_at),
            elapsed: format_elapsed(Duration::from_millis(summary.elapsed_ms)),
            total_targets: summary.target_count(),
            total_tests: summary.total_tests,
            total_success: summary.total_success,
            total_failure: summary.total_failure,
            total_faults: summary.total_faults,
            success: summary.is_success(),
            exception: summary.exception.as_ref().map(|e| e.to_string()),
            targets,
            classes,
        }
    }

    pub fn target(&self, target: &str) -> Option<&TargetView> {
        self.targets.iter().find(|t| t.target == target)
    }

    pub fn class(&self, class_name: &str) -> Option<&ClassView> {
        self.classes.iter().find(|c| c.class_name == class_name)
    }
}

impl TargetView {
    fn from_outcome(outcome: &TargetRunOutcome, output_dir: &Path) -> Self {
        // BTreeMap iteration already yields class-then-method order
        let tests: Vec<TestView> = outcome
            .tests
            .iter()
            .map(|(identity, result)| TestView::new(&outcome.target, identity, result, output_dir))
            .collect();

        let tests_passed = outcome
            .tests
            .values()
            .filter(|r| r.status.is_success())
            .count() as u32;
        let tests_run = outcome.tests.len() as u32;

        Self {
            target: outcome.target.to_string(),
            dir: outcome.target.dir_name(),
            name: outcome
                .name
                .clone()
                .unwrap_or_else(|| outcome.target.to_string()),
            tests_run: plural(tests_run as u64, "test"),
            tests_passed,
            tests_failed: tests_run - tests_passed,
            elapsed: format_elapsed(Duration::from_millis(outcome.duration_ms)),
            started: outcome.started_at.as_ref().map(format_display_time),
            fault: outcome.fault.as_ref().map(|f| f.to_string()),
            tests,
        }
    }
}

impl TestView {
    fn new(
        target: &TargetId,
        identity: &TestIdentity,
        result: &TestResult,
        output_dir: &Path,
    ) -> Self {
        Self {
            target: target.to_string(),
            class_name: identity.class_name.clone(),
            method_name: identity.method_name.clone(),
            class_simple_name: class_simple_name(&identity.class_name).to_string(),
            pretty_method_name: prettify_method_name(&identity.method_name),
            test_id: test_id(identity),
            status: status_css_class(result.status).to_string(),
            duration_ms: result.duration_ms,
            screenshots: result
                .screenshots
                .iter()
                .map(|p| relative_uri(p, output_dir))
                .collect(),
            animated_gif: result.animated_gif.as_deref().map(|p| relative_uri(p, output_dir)),
            failure: result.failure.as_deref().map(parse_failure),
        }
    }
}

/// `com.example.LoginTest` → `LoginTest`
pub fn class_simple_name(class_name: &str) -> &str {
    class_name.rsplit('.').next().unwrap_or(class_name)
}

/// `testClickButtonOne` → `Click Button One`, `test_loads_HTML` → `Loads HTML`
pub fn prettify_method_name(method_name: &str) -> String {
    let trimmed = method_name
        .strip_prefix("test")
        .filter(|rest| {
            rest.starts_with(|c: char| c.is_uppercase() || c.is_ascii_digit() || c == '_')
        })
        .unwrap_or(method_name);

    let chars: Vec<char> = trimmed.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    if words.is_empty() {
        return method_name.to_string();
    }

    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Stable id usable as an HTML anchor
pub fn test_id(identity: &TestIdentity) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
            .collect()
    };
    format!("{}-{}", clean(&identity.class_name), clean(&identity.method_name))
}

pub fn status_css_class(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Pass => "pass",
        TestStatus::Fail => "fail",
        TestStatus::Error => "error",
    }
}

/// Path relative to the output root with `/` separators; paths elsewhere are kept as-is
fn relative_uri(path: &Path, output_dir: &Path) -> String {
    let Ok(relative) = path.strip_prefix(output_dir) else {
        return path.to_string_lossy().into_owned();
    };
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn parse_failure(text: &str) -> StackTrace {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let title = lines.next().unwrap_or_default().to_string();
    StackTrace {
        title,
        lines: lines.map(str::to_string).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Fault;
    use crate::results::ResultAggregator;

    fn summary() -> ExecutionSummary {
        let aggregator = ResultAggregator::new("Nightly", "/out").with_run_id("run-7");
        aggregator.start().unwrap();
        aggregator
            .add_result(
                TargetRunOutcome::new("dev2")
                    .with_name("Pixel 8")
                    .with_duration_ms(65_000)
                    .with_test(
                        TestIdentity::new("com.example.LoginTest", "testLoginSucceeds"),
                        TestResult::pass(10).with_screenshot("/out/dev2/shots/login.png"),
                    )
                    .with_test(
                        TestIdentity::new("com.example.AboutTest", "testShowsVersion"),
                        TestResult::fail(
                            5,
                            "java.lang.AssertionError: expected 2\n\tat AboutTest.java:12\n",
                        )
                        .with_animated_gif("/out/dev2/gifs/about.gif"),
                    ),
            )
            .unwrap();
        aggregator
            .add_result(
                TargetRunOutcome::new("dev1")
                    .with_test(
                        TestIdentity::new("com.example.LoginTest", "testLoginSucceeds"),
                        TestResult::pass(12),
                    ),
            )
            .unwrap();
        aggregator
            .add_result(TargetRunOutcome::failed("dev3", Fault::Timeout(30_000)))
            .unwrap();
        aggregator.end().unwrap()
    }

    #[test]
    fn test_model_header() {
        let model = ReportModel::from_summary(&summary());
        assert_eq!(model.run_id, "run-7");
        assert_eq!(model.title, "Nightly");
        assert_eq!(model.total_targets, 3);
        assert_eq!(model.total_tests, 3);
        assert_eq!(model.total_failure, 1);
        assert_eq!(model.total_faults, 1);
        assert!(!model.success);
        assert!(model.exception.is_none());
    }

    #[test]
    fn test_target_views() {
        let model = ReportModel::from_summary(&summary());
        let order: Vec<_> = model.targets.iter().map(|t| t.target.as_str()).collect();
        assert_eq!(order, vec!["dev1", "dev2", "dev3"]);

        let dev2 = model.target("dev2").unwrap();
        assert_eq!(dev2.name, "Pixel 8");
        assert_eq!(dev2.tests_run, "2 tests");
        assert_eq!(dev2.tests_passed, 1);
        assert_eq!(dev2.tests_failed, 1);
        assert_eq!(dev2.elapsed, "1 minute, 5 seconds");
        assert_eq!(dev2.tests[0].class_simple_name, "AboutTest");
        assert_eq!(dev2.tests[1].screenshots, vec!["dev2/shots/login.png"]);

        let failure = dev2.tests[0].failure.as_ref().unwrap();
        assert_eq!(failure.title, "java.lang.AssertionError: expected 2");
        assert_eq!(failure.lines, vec!["at AboutTest.java:12"]);

        let dev3 = model.target("dev3").unwrap();
        assert_eq!(dev3.name, "dev3");
        assert_eq!(dev3.tests_run, "0 tests");
        assert_eq!(dev3.fault.as_deref(), Some("Target timed out after 30000ms"));
    }

    #[test]
    fn test_artifact_uris_are_relative_to_output() {
        let model = ReportModel::from_summary(&summary());
        let dev2 = model.target("dev2").unwrap();
        assert_eq!(dev2.tests[0].animated_gif.as_deref(), Some("dev2/gifs/about.gif"));
        assert!(dev2.tests[1].animated_gif.is_none());

        let elsewhere = TestView::new(
            &TargetId::new("dev1"),
            &TestIdentity::new("a.B", "m"),
            &TestResult::pass(1).with_animated_gif("/tmp/capture.gif"),
            Path::new("/out"),
        );
        assert_eq!(elsewhere.animated_gif.as_deref(), Some("/tmp/capture.gif"));
    }

    #[test]
    fn test_class_views_sorted() {
        let model = ReportModel::from_summary(&summary());
        let names: Vec<_> = model.classes.iter().map(|c| c.class_simple_name.as_str()).collect();
        assert_eq!(names, vec!["AboutTest", "LoginTest"]);

        let login = model.class("com.example.LoginTest").unwrap();
        let test = &login.tests[0];
        assert_eq!(test.pretty_method_name, "Login Succeeds");
        assert_eq!(test.test_id, "com-example-LoginTest-testLoginSucceeds");
        assert_eq!(test.passed_on, 2);
        let targets: Vec<_> = test.results.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["dev1", "dev2"]);
    }

    #[test]
    fn test_model_is_deterministic() {
        let summary = summary();
        assert_eq!(
            ReportModel::from_summary(&summary),
            ReportModel::from_summary(&summary)
        );
    }

    #[test]
    fn test_prettify_method_name() {
        assert_eq!(
            prettify_method_name("testClickButtonOneDisplaysHelloOne"),
            "Click Button One Displays Hello One"
        );
        assert_eq!(prettify_method_name("test_loads_HTML_page"), "Loads HTML Page");
        assert_eq!(prettify_method_name("loadsHTMLPage"), "Loads HTML Page");
        assert_eq!(prettify_method_name("testing"), "Testing");
        assert_eq!(prettify_method_name("test"), "Test");
    }

    #[test]
    fn test_helpers() {
        assert_eq!(class_simple_name("a.b.C"), "C");
        assert_eq!(class_simple_name("C"), "C");
        assert_eq!(status_css_class(TestStatus::Error), "error");
        assert_eq!(
            relative_uri(Path::new("/elsewhere/x.png"), Path::new("/out")),
            "/elsewhere/x.png"
        );
    }
}
