//! Per-target outcome models
//!
//! Defines target ids, test identities, per-test results and the outcome
//! bundle produced by running the whole suite once on one target.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::Fault;

/// Identifier of one execution target (device serial, emulator name, ...)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory name for this target's private output subtree.
    ///
    /// Serials such as `192.168.56.101:5555` are not valid path components
    /// everywhere, so anything outside `[A-Za-z0-9._-]` becomes `_`.
    pub fn dir_name(&self) -> String {
        let name: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        match name.as_str() {
            "" | "." | ".." => format!("target_{name}").replace('.', "_"),
            _ => name,
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The (declaring class, method) pair naming one logical test on every target
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TestIdentity {
    pub class_name: String,
    pub method_name: String,
}

impl TestIdentity {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_name, self.method_name)
    }
}

impl FromStr for TestIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('#') {
            Some((class, method)) if !class.is_empty() && !method.is_empty() => {
                Ok(Self::new(class, method))
            }
            _ => Err(format!("Invalid test identity '{s}', expected Class#method")),
        }
    }
}

impl From<TestIdentity> for String {
    fn from(id: TestIdentity) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for TestIdentity {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Status of one test on one target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Error,
}

impl TestStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TestStatus::Pass)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Pass => write!(f, "PASS"),
            TestStatus::Fail => write!(f, "FAIL"),
            TestStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of one test as observed on one target, with its artifacts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub status: TestStatus,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated_gif: Option<PathBuf>,
}

impl TestResult {
    pub fn pass(duration_ms: u64) -> Self {
        Self {
            status: TestStatus::Pass,
            duration_ms,
            failure: None,
            screenshots: Vec::new(),
            animated_gif: None,
        }
    }

    pub fn fail(duration_ms: u64, failure: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Fail,
            duration_ms,
            failure: Some(failure.into()),
            screenshots: Vec::new(),
            animated_gif: None,
        }
    }

    pub fn error(failure: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Error,
            duration_ms: 0,
            failure: Some(failure.into()),
            screenshots: Vec::new(),
            animated_gif: None,
        }
    }

    pub fn with_screenshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.screenshots.push(path.into());
        self
    }

    pub fn with_animated_gif(mut self, path: impl Into<PathBuf>) -> Self {
        self.animated_gif = Some(path.into());
        self
    }
}

/// Everything one target produced for one run of the suite
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetRunOutcome {
    pub target: TargetId,

    /// Human-readable target name, when the runner knows one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub duration_ms: u64,

    pub tests_started: u32,
    pub tests_failed: u32,

    /// Set when the run itself could not complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<Fault>,

    #[serde(default)]
    pub tests: BTreeMap<TestIdentity, TestResult>,
}

impl TargetRunOutcome {
    /// Empty outcome for a target that has not reported anything yet
    pub fn new(target: impl Into<TargetId>) -> Self {
        Self {
            target: target.into(),
            name: None,
            started_at: None,
            duration_ms: 0,
            tests_started: 0,
            tests_failed: 0,
            fault: None,
            tests: BTreeMap::new(),
        }
    }

    /// Zero-test outcome carrying the fault that stopped the target
    pub fn failed(target: impl Into<TargetId>, fault: Fault) -> Self {
        Self {
            fault: Some(fault),
            ..Self::new(target)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Record a test result, replacing any earlier result for the same identity.
    ///
    /// The started/failed counters are recomputed from the recorded tests.
    pub fn record(&mut self, identity: TestIdentity, result: TestResult) {
        self.tests.insert(identity, result);
        self.tests_started = self.tests.len() as u32;
        self.tests_failed = self
            .tests
            .values()
            .filter(|r| !r.status.is_success())
            .count() as u32;
    }

    pub fn with_test(mut self, identity: TestIdentity, result: TestResult) -> Self {
        self.record(identity, result);
        self
    }

    pub fn tests_passed(&self) -> u32 {
        self.tests_started.saturating_sub(self.tests_failed)
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }
}

impl fmt::Display for TargetRunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} started, {} failed",
            self.target, self.tests_started, self.tests_failed
        )?;
        if let Some(fault) = &self.fault {
            write!(f, " ({fault})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_string_form() {
        let id = TestIdentity::new("com.example.LoginTest", "testLogin");
        assert_eq!(id.to_string(), "com.example.LoginTest#testLogin");
        assert_eq!("com.example.LoginTest#testLogin".parse::<TestIdentity>(), Ok(id));
        assert!("no-separator".parse::<TestIdentity>().is_err());
        assert!("Class#".parse::<TestIdentity>().is_err());
    }

    #[test]
    fn test_identity_ordering() {
        let mut ids = vec![
            TestIdentity::new("B", "a"),
            TestIdentity::new("A", "z"),
            TestIdentity::new("A", "b"),
        ];
        ids.sort();
        assert_eq!(ids[0], TestIdentity::new("A", "b"));
        assert_eq!(ids[1], TestIdentity::new("A", "z"));
        assert_eq!(ids[2], TestIdentity::new("B", "a"));
    }

    #[test]
    fn test_target_dir_name() {
        assert_eq!(TargetId::new("emulator-5554").dir_name(), "emulator-5554");
        assert_eq!(
            TargetId::new("192.168.56.101:5555").dir_name(),
            "192.168.56.101_5555"
        );
        assert_eq!(TargetId::new("..").dir_name(), "target___");
        assert_eq!(TargetId::new("a/b").dir_name(), "a_b");
    }

    #[test]
    fn test_record_recomputes_counts() {
        let mut outcome = TargetRunOutcome::new("dev1");
        outcome.record(TestIdentity::new("C", "m1"), TestResult::pass(10));
        outcome.record(TestIdentity::new("C", "m2"), TestResult::fail(5, "boom"));
        assert_eq!(outcome.tests_started, 2);
        assert_eq!(outcome.tests_failed, 1);

        outcome.record(TestIdentity::new("C", "m2"), TestResult::pass(7));
        assert_eq!(outcome.tests_started, 2);
        assert_eq!(outcome.tests_failed, 0);
        assert_eq!(outcome.tests_passed(), 2);
    }

    #[test]
    fn test_failed_outcome() {
        let outcome = TargetRunOutcome::failed("dev2", Fault::Timeout(10));
        assert_eq!(outcome.tests_started, 0);
        assert_eq!(outcome.tests_failed, 0);
        assert!(outcome.is_faulted());
        assert!(outcome.tests.is_empty());
    }

    #[test]
    fn test_outcome_json_keys() {
        let outcome = TargetRunOutcome::new("dev1")
            .with_test(TestIdentity::new("C", "m1"), TestResult::pass(1));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["tests"]["C#m1"]["status"], "pass");

        let back: TargetRunOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, outcome);
    }
}
