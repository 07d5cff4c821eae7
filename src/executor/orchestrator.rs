//! Fan-out orchestration
//!
//! Runs the suite once per target and folds every outcome into one summary.
//! A single target runs inline in the caller's task; more than one get a
//! tokio task each, joined before the summary is frozen.

use futures::future::join_all;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::models::{ExecutionSummary, Fault, TargetId, TargetRunOutcome};
use crate::results::{AggregatorError, ResultAggregator, ResultsStorage};
use crate::utils::timer::Timer;

use super::manifest::{FileNameInspector, ManifestInspector, SuiteInfo};
use super::runner::{TargetRunner, TargetTask};

pub const DEFAULT_TITLE: &str = "Fan-out Execution";

/// Reasons a run cannot produce a summary at all
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Could not find application artifact: {}", .0.display())]
    MissingApplication(PathBuf),

    #[error("Could not find test suite artifact: {}", .0.display())]
    MissingSuite(PathBuf),

    #[error("Output location is required")]
    MissingOutput,

    #[error("Unable to inspect artifacts: {0}")]
    Manifest(String),

    #[error(transparent)]
    Lifecycle(#[from] AggregatorError),
}

/// Runs one suite across a set of targets
pub struct Orchestrator {
    title: String,
    application: Option<PathBuf>,
    suite: Option<PathBuf>,
    output: Option<PathBuf>,
    runner: Arc<dyn TargetRunner>,
    inspector: Arc<dyn ManifestInspector>,
    timeout: Option<Duration>,
    max_concurrent: Option<usize>,
}

impl Orchestrator {
    pub fn new(runner: Arc<dyn TargetRunner>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            application: None,
            suite: None,
            output: None,
            runner,
            inspector: Arc::new(FileNameInspector),
            timeout: None,
            max_concurrent: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_application(mut self, path: impl Into<PathBuf>) -> Self {
        self.application = Some(path.into());
        self
    }

    pub fn with_suite(mut self, path: impl Into<PathBuf>) -> Self {
        self.suite = Some(path.into());
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn ManifestInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    /// Give up on a target after this long; the target gets a timeout fault
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cap on targets running at once; uncapped by default
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = Some(max.max(1));
        self
    }

    fn validate(&self) -> Result<(&Path, &Path, &Path), RunError> {
        let application = self
            .application
            .as_deref()
            .filter(|p| p.exists())
            .ok_or_else(|| {
                RunError::MissingApplication(self.application.clone().unwrap_or_default())
            })?;
        let suite = self
            .suite
            .as_deref()
            .filter(|p| p.exists())
            .ok_or_else(|| RunError::MissingSuite(self.suite.clone().unwrap_or_default()))?;
        let output = self
            .output
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(RunError::MissingOutput)?;
        Ok((application, suite, output))
    }

    /// Run the suite on every target and return the frozen summary.
    ///
    /// Only bad configuration is an `Err`. Target failures and orchestration
    /// failures once the aggregator has started (an unusable output root
    /// included) are recorded inside the summary; check
    /// [`ExecutionSummary::is_success`].
    pub async fn run(&self, targets: &BTreeSet<TargetId>) -> Result<ExecutionSummary, RunError> {
        let (application, suite, output) = self.validate()?;

        let aggregator = Arc::new(ResultAggregator::new(&self.title, output));

        if targets.is_empty() {
            info!("No targets.");
            aggregator.start()?;
            return Ok(aggregator.end()?);
        }

        info!("Executing suite on {} targets.", targets.len());

        let suite_info = self
            .inspector
            .inspect(application, suite)
            .map_err(|e| RunError::Manifest(format!("{e:#}")))?;
        debug!(
            "{} in {}",
            suite_info.application_package,
            application.display()
        );
        debug!("{} in {}", suite_info.suite_package, suite.display());

        aggregator.start()?;

        let storage = ResultsStorage::new(output);
        if let Err(e) = storage.clean() {
            error!("Unable to prepare {}: {:#}", output.display(), e);
            aggregator.set_exception(Fault::orchestration(format!(
                "Unable to prepare output directory: {e:#}"
            )))?;
            return Ok(aggregator.end()?);
        }

        let timer = Timer::start("dispatch");

        let tasks: Vec<TargetTask> = targets
            .iter()
            .map(|t| self.task(t.clone(), &storage, application, suite, &suite_info))
            .collect();

        let dispatched = match <[TargetTask; 1]>::try_from(tasks) {
            // Only one target, run it right here.
            Ok([task]) => self.run_inline(task, &aggregator).await,
            Err(tasks) => self.run_concurrent(tasks, &aggregator).await,
        };

        if let Err(fault) = dispatched {
            aggregator.set_exception(fault)?;
        }

        info!(
            "All {} targets finished in {}ms",
            targets.len(),
            timer.stop().as_millis()
        );

        Ok(aggregator.end()?)
    }

    fn task(
        &self,
        target: TargetId,
        storage: &ResultsStorage,
        application: &Path,
        suite: &Path,
        suite_info: &SuiteInfo,
    ) -> TargetTask {
        TargetTask {
            runner: Arc::clone(&self.runner),
            storage: storage.clone(),
            target,
            application: application.to_path_buf(),
            suite: suite.to_path_buf(),
            suite_info: suite_info.clone(),
            timeout: self.timeout,
        }
    }

    async fn run_inline(
        &self,
        task: TargetTask,
        aggregator: &ResultAggregator,
    ) -> Result<(), Fault> {
        let outcome = task.execute().await;
        aggregator
            .add_result(outcome)
            .map_err(|e| Fault::orchestration(e.to_string()))
    }

    async fn run_concurrent(
        &self,
        tasks: Vec<TargetTask>,
        aggregator: &Arc<ResultAggregator>,
    ) -> Result<(), Fault> {
        let permits = self.max_concurrent.unwrap_or(tasks.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut targets = Vec::with_capacity(tasks.len());
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let semaphore = Arc::clone(&semaphore);
            let aggregator = Arc::clone(aggregator);
            targets.push(task.target.clone());

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = task.execute().await;
                aggregator.add_result(outcome)
            }));
        }

        let mut problems = Vec::new();
        for (target, joined) in targets.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => problems.push(format!("{target}: {e}")),
                Err(join_err) => {
                    // The runner's own panics are caught inside the task, so this
                    // is a cancelled task or a panic while folding.
                    error!("Task for {} did not complete: {}", target, join_err);
                    let fault = if join_err.is_panic() {
                        Fault::from_panic(join_err.into_panic().as_ref())
                    } else {
                        Fault::execution("target task was cancelled")
                    };
                    let outcome = TargetRunOutcome::failed(target.clone(), fault);
                    if let Err(e) = aggregator.add_result(outcome) {
                        problems.push(format!("{target}: {e}"));
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Fault::orchestration(problems.join("; ")))
        }
    }
}
