//! Per-target runner seam
//!
//! The orchestrator never knows how a suite is executed on a target; it only
//! hands a [`TargetContext`] to a [`TargetRunner`] and waits for an outcome.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::models::{Fault, TargetId, TargetRunOutcome};
use crate::results::ResultsStorage;

use super::manifest::SuiteInfo;

/// Everything a runner needs to execute the suite on one target
#[derive(Clone, Debug)]
pub struct TargetContext {
    pub target: TargetId,

    /// Private output directory; no other target writes here
    pub output_dir: PathBuf,

    pub application: PathBuf,
    pub suite: PathBuf,
    pub suite_info: SuiteInfo,
}

/// Executes the whole suite on one target
pub trait TargetRunner: Send + Sync {
    fn run_on_target<'a>(
        &'a self,
        ctx: &'a TargetContext,
    ) -> BoxFuture<'a, Result<TargetRunOutcome, Fault>>;
}

/// One unit of work for the orchestrator: run one target, never fail.
///
/// Whatever goes wrong inside (directory setup, runner error, panic, timeout)
/// comes back as a zero-test outcome carrying the fault.
pub(crate) struct TargetTask {
    pub runner: Arc<dyn TargetRunner>,
    pub storage: ResultsStorage,
    pub target: TargetId,
    pub application: PathBuf,
    pub suite: PathBuf,
    pub suite_info: SuiteInfo,
    pub timeout: Option<Duration>,
}

impl TargetTask {
    pub async fn execute(self) -> TargetRunOutcome {
        let target = self.target.clone();
        info!("Running suite on {}", target);

        let output_dir = match self.storage.ensure_target_dir(&target) {
            Ok(dir) => dir,
            Err(e) => {
                error!("Unable to prepare output for {}: {:#}", target, e);
                return TargetRunOutcome::failed(target, Fault::from(e));
            }
        };

        let ctx = TargetContext {
            target: target.clone(),
            output_dir,
            application: self.application,
            suite: self.suite,
            suite_info: self.suite_info,
        };

        // The future is built inside the guard so a runner that panics
        // before returning one is caught too
        let runner = &self.runner;
        let run = AssertUnwindSafe(async { runner.run_on_target(&ctx).await }).catch_unwind();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => Ok(Err(Fault::Timeout(limit.as_millis() as u64))),
            },
            None => run.await,
        };

        let outcome = match result {
            Ok(Ok(mut outcome)) => {
                if outcome.target != target {
                    warn!(
                        "Runner reported target {} while running {}, keeping {}",
                        outcome.target, target, target
                    );
                    outcome.target = target;
                }
                outcome
            }
            Ok(Err(fault)) => {
                error!("{}: {}", target, fault);
                TargetRunOutcome::failed(target, fault)
            }
            Err(panic) => {
                let fault = Fault::from_panic(panic.as_ref());
                error!("{}: {}", target, fault);
                TargetRunOutcome::failed(target, fault)
            }
        };

        info!("Finished {}", outcome);
        outcome
    }
}
