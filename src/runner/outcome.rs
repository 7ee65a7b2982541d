//! Reason-tagged errors collected during a run.
//!
//! A run never stops at the first problem. Every failing step and the
//! interruption (if any) end up as [`ExecutionError`]s in the list returned
//! next to the report. Each carries a coarse [`Reason`] meant for log fields
//! and metric labels.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Coarse category of an execution error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// The run's cancellation token fired.
    Interrupted,
    /// A step's `run` returned an error (or panicked).
    StepFailed,
}

impl Reason {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Interrupted => "interrupted",
            Reason::StepFailed => "step_failed",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem observed during a run.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The run was cancelled. Recorded at most once per run.
    #[error("execution cancelled")]
    Interrupted,

    /// A step failed; wraps the step's own error.
    #[error("step {step} failed: {source:#}")]
    StepFailed {
        step: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ExecutionError {
    /// Wrap a step's error.
    pub fn step_failed(step: impl Into<String>, source: anyhow::Error) -> Self {
        Self::StepFailed {
            step: step.into(),
            source,
        }
    }

    /// The error's reason code.
    pub fn reason(&self) -> Reason {
        match self {
            ExecutionError::Interrupted => Reason::Interrupted,
            ExecutionError::StepFailed { .. } => Reason::StepFailed,
        }
    }

    /// Name of the failed step, for step failures.
    pub fn step(&self) -> Option<&str> {
        match self {
            ExecutionError::Interrupted => None,
            ExecutionError::StepFailed { step, .. } => Some(step),
        }
    }
}

/// Count errors per reason.
pub fn reason_counts(errors: &[ExecutionError]) -> BTreeMap<Reason, usize> {
    let mut counts = BTreeMap::new();
    for err in errors {
        *counts.entry(err.reason()).or_insert(0) += 1;
    }
    counts
}
