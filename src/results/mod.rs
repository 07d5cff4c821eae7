//! Result aggregation, report model and storage
//!
//! Folds per-target outcomes into a cross-target summary, derives the report
//! model from it and persists both under the output directory.

mod aggregator;
mod report;
mod storage;

pub use aggregator::{AggregatorError, ResultAggregator};
pub use report::{ClassTestView, ClassView, ReportModel, StackTrace, TargetView, TestView};
pub use storage::{ExportFormat, ResultsStorage};
