//! Configuration module
//!
//! Handles loading and managing configuration.

pub mod env;
pub mod file;

pub use file::ConfigFile;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::executor::DEFAULT_TITLE;
use crate::models::TargetId;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Title shown on the report
    pub title: String,

    /// Output root, wiped at the start of every run
    pub output_dir: PathBuf,

    /// Application artifact under test
    pub application: Option<PathBuf>,

    /// Test suite artifact
    pub suite: Option<PathBuf>,

    /// Target identifiers, e.g. device serials
    pub targets: Vec<String>,

    /// External program that runs the suite on one target
    pub runner: RunnerConfig,

    /// Per-target time limit in seconds; unset means no limit
    pub target_timeout_secs: Option<u64>,

    /// Maximum targets running at once; unset means all of them
    pub max_concurrent: Option<usize>,

    /// Enable debug logging
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            output_dir: PathBuf::from("fanrun-output"),
            application: None,
            suite: None,
            targets: Vec::new(),
            runner: RunnerConfig::default(),
            target_timeout_secs: None,
            max_concurrent: None,
            debug: false,
        }
    }
}

impl AppConfig {
    /// Targets as a deduplicated set
    pub fn target_ids(&self) -> BTreeSet<TargetId> {
        self.targets
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(TargetId::new)
            .collect()
    }

    pub fn target_timeout(&self) -> Option<Duration> {
        self.target_timeout_secs.map(Duration::from_secs)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            anyhow::bail!("Title must not be empty");
        }
        if self.output_dir.as_os_str().is_empty() {
            anyhow::bail!("Output directory must not be empty");
        }
        if self.target_timeout_secs == Some(0) {
            anyhow::bail!("target_timeout_secs must be greater than 0");
        }
        if self.max_concurrent == Some(0) {
            anyhow::bail!("max_concurrent must be greater than 0");
        }
        Ok(())
    }
}

/// External runner command
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub program: String,

    /// Supports `{target}`, `{output}`, `{app}`, `{suite}`, `{app_package}`
    /// and `{suite_package}` placeholders
    pub args: Vec<String>,
}

impl RunnerConfig {
    pub fn is_configured(&self) -> bool {
        !self.program.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.title, DEFAULT_TITLE);
        assert_eq!(config.output_dir, PathBuf::from("fanrun-output"));
        assert!(config.target_timeout().is_none());
        assert!(!config.runner.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_target_ids_dedup() {
        let config = AppConfig {
            targets: vec!["b".into(), "a".into(), " b ".into(), "".into()],
            ..Default::default()
        };
        let ids: Vec<_> = config.target_ids().into_iter().collect();
        assert_eq!(ids, vec![TargetId::new("a"), TargetId::new("b")]);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = AppConfig {
            max_concurrent: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            target_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("targets: [emulator-5554]\n").unwrap();
        assert_eq!(config.targets, vec!["emulator-5554"]);
        assert_eq!(config.title, DEFAULT_TITLE);
    }
}
