//! Data models for fan-out runs
//!
//! Per-target outcomes, merged cross-target nodes and the frozen summary.

mod fault;
mod outcome;
mod summary;

pub use fault::Fault;
pub use outcome::{TargetId, TargetRunOutcome, TestIdentity, TestResult, TestStatus};
pub use summary::{ExecutionSummary, TestClassNode, TestNode};
