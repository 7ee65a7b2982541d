//! Run options schema.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StepGraphError;

/// How a node reachable through several parents is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Dispatch each node at most once per run.
    #[default]
    Once,
    /// Evaluate a child independently under every parent edge that
    /// completes. A node whose requirements are already met when a second
    /// parent finishes runs again.
    PerParentEdge,
}

impl DispatchPolicy {
    /// Config spelling of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchPolicy::Once => "once",
            DispatchPolicy::PerParentEdge => "per_parent_edge",
        }
    }
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchPolicy {
    type Err = StepGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(DispatchPolicy::Once),
            "per_parent_edge" | "per-parent-edge" => Ok(DispatchPolicy::PerParentEdge),
            other => Err(StepGraphError::ConfigValidationError {
                message: format!(
                    "unknown dispatch policy '{}' (expected 'once' or 'per_parent_edge')",
                    other
                ),
            }),
        }
    }
}

/// Options for one run of the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunOptions {
    /// Name of the produced test suite.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub suite_name: String,

    /// Ask steps to only pretend; successful cases are reported skipped.
    #[serde(skip_serializing_if = "is_false")]
    pub dry_run: bool,

    /// Diamond dependency handling.
    pub dispatch: DispatchPolicy,

    /// Directory for the JUnit XML artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub junit_dir: Option<PathBuf>,
}

fn is_false(b: &bool) -> bool {
    !*b
}
