//! Fault types captured during a run
//!
//! A fault is data, not a propagated error: per-target faults travel on the
//! target's outcome, a top-level fault travels on the execution summary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A captured failure of a target run or of the orchestration itself
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Fault {
    #[error("Target execution failed: {0}")]
    Execution(String),

    /// Milliseconds the target was given before it was abandoned
    #[error("Target timed out after {0}ms")]
    Timeout(u64),

    #[error("Target task panicked: {0}")]
    Panicked(String),

    #[error("Orchestration failed: {0}")]
    Orchestration(String),
}

impl Fault {
    pub fn execution(message: impl Into<String>) -> Self {
        Fault::Execution(message.into())
    }

    pub fn orchestration(message: impl Into<String>) -> Self {
        Fault::Orchestration(message.into())
    }

    /// Build a fault from a panic payload caught at a task boundary
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Fault::Panicked(message)
    }
}

impl From<anyhow::Error> for Fault {
    fn from(err: anyhow::Error) -> Self {
        Fault::Execution(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display() {
        assert_eq!(
            Fault::Timeout(30_000).to_string(),
            "Target timed out after 30000ms"
        );
        assert_eq!(
            Fault::execution("adb offline").to_string(),
            "Target execution failed: adb offline"
        );
    }

    #[test]
    fn test_fault_from_panic() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(Fault::from_panic(payload.as_ref()), Fault::Panicked("boom".into()));

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(
            Fault::from_panic(payload.as_ref()),
            Fault::Panicked("kaboom".into())
        );
    }

    #[test]
    fn test_fault_serde() {
        let json = serde_json::to_string(&Fault::Timeout(5)).unwrap();
        assert_eq!(json, r#"{"kind":"timeout","detail":5}"#);
        let back: Fault = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Fault::Timeout(5));
    }
}
