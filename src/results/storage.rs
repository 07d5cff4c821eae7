//! Results storage and retrieval
//!
//! Owns the layout of a run's output directory:
//!
//! ```text
//! <output>/summary.json        frozen execution summary
//! <output>/report.json         report model for renderers
//! <output>/<target>/           private subtree of one target
//! <output>/<target>/target.json
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{ExecutionSummary, TargetId};

use super::report::ReportModel;

const SUMMARY_FILE: &str = "summary.json";
const REPORT_FILE: &str = "report.json";
const TARGET_FILE: &str = "target.json";

/// Generate unique run ID
pub(crate) fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Output directory manager for one run
#[derive(Clone, Debug)]
pub struct ResultsStorage {
    base_dir: PathBuf,
}

impl ResultsStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Remove anything a previous run left behind and recreate the root
    pub fn clean(&self) -> Result<()> {
        if self.base_dir.exists() {
            fs::remove_dir_all(&self.base_dir).with_context(|| {
                format!(
                    "Unable to clean output directory: {}",
                    self.base_dir.display()
                )
            })?;
            debug!("Removed previous output at {}", self.base_dir.display());
        }
        self.ensure_dir()
    }

    /// Ensure storage directory exists
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.base_dir.display()
            )
        })
    }

    /// Private directory of one target
    pub fn target_dir(&self, target: &TargetId) -> PathBuf {
        self.base_dir.join(target.dir_name())
    }

    pub fn ensure_target_dir(&self, target: &TargetId) -> Result<PathBuf> {
        let dir = self.target_dir(target);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create target directory: {}", dir.display()))?;
        Ok(dir)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.base_dir.join(SUMMARY_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.base_dir.join(REPORT_FILE)
    }

    pub fn save_summary(&self, summary: &ExecutionSummary) -> Result<PathBuf> {
        let path = self.summary_path();
        write_json(&path, summary)?;
        info!("Saved execution summary to {}", path.display());
        Ok(path)
    }

    /// Save the report model and one view file per target
    pub fn save_report(&self, report: &ReportModel) -> Result<PathBuf> {
        let path = self.report_path();
        write_json(&path, report)?;

        for target in &report.targets {
            let dir = self.base_dir.join(&target.dir);
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create target directory: {}", dir.display()))?;
            write_json(&dir.join(TARGET_FILE), target)?;
        }

        info!("Saved report model to {}", path.display());
        Ok(path)
    }

    pub fn load_summary(&self) -> Result<ExecutionSummary> {
        read_json(&self.summary_path())
    }

    pub fn load_report(&self) -> Result<ReportModel> {
        read_json(&self.report_path())
    }

    /// Export every (target, test) row of a report
    pub fn export(&self, report: &ReportModel, path: &Path, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Json => write_json(path, report)?,
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;

                writer.write_record([
                    "target",
                    "class",
                    "method",
                    "status",
                    "duration_ms",
                    "failure",
                ])?;

                for target in &report.targets {
                    for test in &target.tests {
                        writer.write_record([
                            target.target.clone(),
                            test.class_name.clone(),
                            test.method_name.clone(),
                            test.status.clone(),
                            test.duration_ms.to_string(),
                            test.failure
                                .as_ref()
                                .map(|f| f.title.clone())
                                .unwrap_or_default(),
                        ])?;
                    }
                }
                writer.flush()?;
            }
        }

        info!("Exported results to {}", path.display());
        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let value =
        serde_json::from_reader(reader).with_context(|| format!("Failed to parse {}", path.display()))?;
    debug!("Loaded {}", path.display());
    Ok(value)
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fault, TargetRunOutcome, TestIdentity, TestResult};
    use crate::results::ResultAggregator;
    use tempfile::tempdir;

    fn summary_in(dir: &Path) -> ExecutionSummary {
        let aggregator = ResultAggregator::new("Storage", dir);
        aggregator.start().unwrap();
        aggregator
            .add_result(
                TargetRunOutcome::new("10.0.0.1:5555")
                    .with_test(TestIdentity::new("C", "m1"), TestResult::pass(3))
                    .with_test(TestIdentity::new("C", "m2"), TestResult::fail(4, "nope")),
            )
            .unwrap();
        aggregator
            .add_result(TargetRunOutcome::failed("dev2", Fault::execution("offline")))
            .unwrap();
        aggregator.end().unwrap()
    }

    #[test]
    fn test_generate_run_id() {
        let id = generate_run_id();
        assert!(!id.is_empty());
        assert_eq!(id.len(), "20240101_000000_0000".len());
    }

    #[test]
    fn test_clean_removes_stale_files() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path().join("out"));
        storage.ensure_dir().unwrap();
        let stale = storage.base_dir().join("stale.txt");
        fs::write(&stale, "old").unwrap();

        storage.clean().unwrap();
        assert!(storage.base_dir().exists());
        assert!(!stale.exists());
    }

    #[test]
    fn test_target_dirs_are_isolated() {
        let storage = ResultsStorage::new("/out");
        let a = storage.target_dir(&TargetId::new("10.0.0.1:5555"));
        let b = storage.target_dir(&TargetId::new("10.0.0.2:5555"));
        assert_ne!(a, b);
        assert_eq!(a, PathBuf::from("/out/10.0.0.1_5555"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());
        let summary = summary_in(dir.path());
        let report = ReportModel::from_summary(&summary);

        storage.save_summary(&summary).unwrap();
        storage.save_report(&report).unwrap();

        assert_eq!(storage.load_summary().unwrap(), summary);
        assert_eq!(storage.load_report().unwrap(), report);
        assert!(dir.path().join("10.0.0.1_5555").join("target.json").exists());
        assert!(dir.path().join("dev2").join("target.json").exists());
    }

    #[test]
    fn test_export_csv() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());
        let report = ReportModel::from_summary(&summary_in(dir.path()));
        let path = dir.path().join("results.csv");

        storage.export(&report, &path, ExportFormat::Csv).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "target,class,method,status,duration_ms,failure");
        assert_eq!(lines[2], "10.0.0.1:5555,C,m2,fail,4,nope");
    }

    #[test]
    fn test_export_format() {
        assert_eq!(ExportFormat::from_str("JSON"), Some(ExportFormat::Json));
        assert_eq!(
            ExportFormat::from_extension(Path::new("out.csv")),
            Some(ExportFormat::Csv)
        );
        assert!(ExportFormat::from_str("xml").is_none());
    }
}
