//! Test execution engine
//!
//! Fans a suite out across targets and folds every outcome into one summary.

mod command;
mod manifest;
mod orchestrator;
mod runner;

pub use command::CommandRunner;
pub use manifest::{FileNameInspector, ManifestInspector, SuiteInfo};
pub use orchestrator::{Orchestrator, RunError, DEFAULT_TITLE};
pub use runner::{TargetContext, TargetRunner};
