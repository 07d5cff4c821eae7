//! Result aggregation
//!
//! A one-shot builder that folds per-target outcomes into a merged
//! class/test tree as they arrive, then freezes an [`ExecutionSummary`].
//!
//! Every method takes `&self`; share the aggregator behind an `Arc` and call
//! [`ResultAggregator::add_result`] from as many target tasks as needed. The
//! internal mutex is the only synchronization point between them.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::models::{ExecutionSummary, Fault, TargetRunOutcome, TestClassNode};
use crate::utils::timer::Timer;

use super::storage::generate_run_id;

/// Lifecycle contract violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregatorError {
    #[error("Aggregator has not been started")]
    NotStarted,

    #[error("Aggregator was already started")]
    AlreadyStarted,

    #[error("Aggregator has already ended")]
    AlreadyEnded,

    #[error("Top-level exception already recorded: {0}")]
    ExceptionAlreadySet(Fault),

    #[error("Aggregator state is poisoned by a panic in another task")]
    Poisoned,
}

/// Builder lifecycle
enum State {
    NotStarted,
    Started(Accumulator),
    Ended,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::NotStarted => "not-started",
            State::Started(_) => "started",
            State::Ended => "ended",
        }
    }
}

/// Mutable state while outcomes are arriving
struct Accumulator {
    timer: Timer,
    /// Every outcome in arrival order, including repeats of a target
    outcomes: Vec<TargetRunOutcome>,
    classes: BTreeMap<String, TestClassNode>,
    exception: Option<Fault>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            timer: Timer::start("execution"),
            outcomes: Vec::new(),
            classes: BTreeMap::new(),
            exception: None,
        }
    }

    /// Merge one outcome's tests into the class tree and keep the outcome
    fn fold(&mut self, outcome: TargetRunOutcome) {
        for (identity, result) in &outcome.tests {
            let class = self
                .classes
                .entry(identity.class_name.clone())
                .or_insert_with(|| TestClassNode::new(identity.class_name.clone()));

            let replaced = class
                .test_mut(identity)
                .record(outcome.target.clone(), result.clone());
            if replaced.is_some() {
                debug!(
                    "Replaced earlier result of {} on {}",
                    identity, outcome.target
                );
            }
        }

        self.outcomes.push(outcome);
    }

    fn finish(self, run_id: String, title: String, output_dir: PathBuf) -> ExecutionSummary {
        let Accumulator {
            timer,
            mut outcomes,
            classes,
            exception,
        } = self;

        // Stable, so repeats of one target keep their arrival order
        outcomes.sort_by(|a, b| a.target.cmp(&b.target));

        let mut total_tests = 0u32;
        let mut total_success = 0u32;
        let mut total_failure = 0u32;
        let mut total_faults = 0u32;
        for outcome in &outcomes {
            total_tests += outcome.tests_started;
            total_success += outcome.tests_passed();
            total_failure += outcome.tests_failed;
            if outcome.is_faulted() {
                total_faults += 1;
            }
        }

        let started_at = timer.started_at();
        let elapsed = timer.stop();
        let ended_at = started_at
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());

        ExecutionSummary {
            run_id,
            title,
            output_dir,
            started_at,
            ended_at,
            elapsed_ms: elapsed.as_millis() as u64,
            total_tests,
            total_success,
            total_failure,
            total_faults,
            outcomes,
            classes,
            exception,
        }
    }
}

/// Thread-safe, one-shot aggregator of target outcomes
pub struct ResultAggregator {
    run_id: String,
    title: String,
    output_dir: PathBuf,
    state: Mutex<State>,
}

impl ResultAggregator {
    pub fn new(title: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_id: generate_run_id(),
            title: title.into(),
            output_dir: output_dir.into(),
            state: Mutex::new(State::NotStarted),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Record the start instant. Valid exactly once, before anything else.
    pub fn start(&self) -> Result<(), AggregatorError> {
        let mut state = self.lock()?;
        match &*state {
            State::NotStarted => {
                *state = State::Started(Accumulator::new());
                info!("Aggregation started for '{}' ({})", self.title, self.run_id);
                Ok(())
            }
            State::Started(_) => Err(violation(AggregatorError::AlreadyStarted)),
            State::Ended => Err(violation(AggregatorError::AlreadyEnded)),
        }
    }

    /// Fold one target's outcome into the aggregate
    pub fn add_result(&self, outcome: TargetRunOutcome) -> Result<(), AggregatorError> {
        let mut state = self.lock()?;
        match &mut *state {
            State::Started(acc) => {
                debug!("Folding {}", outcome);
                acc.fold(outcome);
                Ok(())
            }
            State::NotStarted => Err(violation(AggregatorError::NotStarted)),
            State::Ended => Err(violation(AggregatorError::AlreadyEnded)),
        }
    }

    /// Record the single top-level fault of the run
    pub fn set_exception(&self, fault: Fault) -> Result<(), AggregatorError> {
        let mut state = self.lock()?;
        match &mut *state {
            State::Started(acc) => {
                if let Some(existing) = &acc.exception {
                    return Err(violation(AggregatorError::ExceptionAlreadySet(
                        existing.clone(),
                    )));
                }
                error!("Run failed outside any target: {}", fault);
                acc.exception = Some(fault);
                Ok(())
            }
            State::NotStarted => Err(violation(AggregatorError::NotStarted)),
            State::Ended => Err(violation(AggregatorError::AlreadyEnded)),
        }
    }

    /// Freeze the aggregate. The aggregator accepts nothing afterwards.
    pub fn end(&self) -> Result<ExecutionSummary, AggregatorError> {
        let mut state = self.lock()?;
        match std::mem::replace(&mut *state, State::Ended) {
            State::Started(acc) => {
                let summary = acc.finish(
                    self.run_id.clone(),
                    self.title.clone(),
                    self.output_dir.clone(),
                );
                info!("Aggregation ended: {}", summary);
                Ok(summary)
            }
            State::NotStarted => {
                *state = State::NotStarted;
                Err(violation(AggregatorError::NotStarted))
            }
            State::Ended => Err(violation(AggregatorError::AlreadyEnded)),
        }
    }

    /// Current lifecycle state, for diagnostics
    pub fn state_name(&self) -> &'static str {
        self.state
            .lock()
            .map(|s| s.name())
            .unwrap_or("poisoned")
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AggregatorError> {
        self.state
            .lock()
            .map_err(|_| violation(AggregatorError::Poisoned))
    }
}

fn violation(err: AggregatorError) -> AggregatorError {
    error!("Aggregator contract violation: {}", err);
    err
}
