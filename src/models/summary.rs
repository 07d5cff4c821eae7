//! Cross-target aggregate models
//!
//! Merged class/test nodes and the frozen execution summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use super::{Fault, TargetId, TargetRunOutcome, TestIdentity, TestResult};

/// One logical test merged across every target that ran it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestNode {
    pub identity: TestIdentity,

    /// At most one entry per target; a later report for the same target replaces the earlier one
    pub results: BTreeMap<TargetId, TestResult>,
}

impl TestNode {
    pub fn new(identity: TestIdentity) -> Self {
        Self {
            identity,
            results: BTreeMap::new(),
        }
    }

    /// Store a target's result, returning the entry it replaced
    pub fn record(&mut self, target: TargetId, result: TestResult) -> Option<TestResult> {
        self.results.insert(target, result)
    }

    pub fn result_for(&self, target: &TargetId) -> Option<&TestResult> {
        self.results.get(target)
    }

    pub fn passed_on(&self) -> usize {
        self.results.values().filter(|r| r.status.is_success()).count()
    }

    pub fn failed_on(&self) -> usize {
        self.results.len() - self.passed_on()
    }

    /// Passed on some targets and failed on others
    pub fn is_inconsistent(&self) -> bool {
        self.passed_on() > 0 && self.failed_on() > 0
    }
}

/// All tests declared by one class, merged across targets
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestClassNode {
    pub class_name: String,

    /// Keyed by method name
    pub tests: BTreeMap<String, TestNode>,
}

impl TestClassNode {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            tests: BTreeMap::new(),
        }
    }

    /// Look up the node for a method, creating it on first sight
    pub fn test_mut(&mut self, identity: &TestIdentity) -> &mut TestNode {
        self.tests
            .entry(identity.method_name.clone())
            .or_insert_with(|| TestNode::new(identity.clone()))
    }

    pub fn test(&self, method_name: &str) -> Option<&TestNode> {
        self.tests.get(method_name)
    }
}

/// Frozen snapshot of a whole run, built once when aggregation ends
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub run_id: String,
    pub title: String,
    pub output_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub total_tests: u32,
    pub total_success: u32,
    pub total_failure: u32,

    /// Number of targets whose run could not complete
    pub total_faults: u32,

    /// Sorted by target id
    pub outcomes: Vec<TargetRunOutcome>,

    /// Keyed by class name
    pub classes: BTreeMap<String, TestClassNode>,

    /// Fault in the orchestration itself, outside any one target
    pub exception: Option<Fault>,
}

impl ExecutionSummary {
    /// No top-level fault, no faulted target and no failing test
    pub fn is_success(&self) -> bool {
        self.exception.is_none() && self.total_faults == 0 && self.total_failure == 0
    }

    pub fn outcome(&self, target: &TargetId) -> Option<&TargetRunOutcome> {
        self.outcomes.iter().find(|o| &o.target == target)
    }

    pub fn test(&self, identity: &TestIdentity) -> Option<&TestNode> {
        self.classes
            .get(&identity.class_name)
            .and_then(|c| c.test(&identity.method_name))
    }

    /// Distinct targets; a target reported twice is counted once
    pub fn target_count(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| &o.target)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} tests on {} targets, {} passed, {} failed",
            self.title,
            self.total_tests,
            self.outcomes.len(),
            self.total_success,
            self.total_failure
        )?;
        if self.total_faults > 0 {
            write!(f, ", {} faulted targets", self.total_faults)?;
        }
        if let Some(e) = &self.exception {
            write!(f, " ({e})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_replaces_per_target() {
        let mut node = TestNode::new(TestIdentity::new("C", "m"));
        assert!(node.record("dev1".into(), TestResult::fail(1, "x")).is_none());
        assert!(node.record("dev1".into(), TestResult::pass(2)).is_some());
        node.record("dev2".into(), TestResult::fail(3, "y"));

        assert_eq!(node.results.len(), 2);
        assert_eq!(node.passed_on(), 1);
        assert_eq!(node.failed_on(), 1);
        assert!(node.is_inconsistent());
    }

    #[test]
    fn test_class_node_creates_once() {
        let mut class = TestClassNode::new("C");
        let id = TestIdentity::new("C", "m");
        class.test_mut(&id).record("dev1".into(), TestResult::pass(1));
        class.test_mut(&id).record("dev2".into(), TestResult::pass(1));

        assert_eq!(class.tests.len(), 1);
        assert_eq!(class.test("m").map(|t| t.results.len()), Some(2));
    }
}
