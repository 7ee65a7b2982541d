//! Run reports in test-suite form.
//!
//! A run produces one [`TestSuite`]. Each completed step contributes one
//! [`TestCase`] (or the cases it reports itself), in the order completions
//! were observed. [`TestSuites`] wraps suites for JUnit XML output, see
//! [`junit`].

pub mod junit;

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::{Result, StepGraphError};

pub use junit::write_junit;

/// Message put on cases of steps that succeeded in dry-run mode.
pub const DRY_RUN_MESSAGE: &str = "Dry run";

/// One reported result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    /// Case name (the step description for synthesized cases).
    pub name: String,
    /// Wall-clock duration.
    #[serde(rename = "duration_secs", serialize_with = "as_secs")]
    pub duration: Duration,
    /// Failure output, if the case failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Skip reason, if the case was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl TestCase {
    /// Create a passing case.
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
            failure: None,
            skipped: None,
        }
    }

    /// Mark the case failed.
    pub fn with_failure(mut self, output: impl Into<String>) -> Self {
        self.failure = Some(output.into());
        self
    }

    /// Mark the case skipped.
    pub fn with_skip(mut self, message: impl Into<String>) -> Self {
        self.skipped = Some(message.into());
        self
    }

    /// Whether the case carries a failure.
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Whether the case carries a skip marker.
    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// Aggregated cases of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestSuite {
    /// Suite name.
    pub name: String,
    /// Total elapsed time of the run.
    #[serde(rename = "duration_secs", serialize_with = "as_secs")]
    pub duration: Duration,
    /// Number of recorded cases.
    pub num_tests: usize,
    /// Number of failed cases.
    pub num_failed: usize,
    /// Number of skipped cases.
    pub num_skipped: usize,
    /// Cases in recording order.
    pub test_cases: Vec<TestCase>,
}

impl TestSuite {
    /// Create an empty suite.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a case and update the counters.
    ///
    /// A failed case counts as failed even if it is also marked skipped.
    pub fn record(&mut self, case: TestCase) {
        if case.is_failed() {
            self.num_failed += 1;
        } else if case.is_skipped() {
            self.num_skipped += 1;
        }
        self.num_tests += 1;
        self.test_cases.push(case);
    }

    /// Number of cases that neither failed nor were skipped.
    pub fn num_passed(&self) -> usize {
        self.num_tests - self.num_failed - self.num_skipped
    }

    /// Render the suite as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| StepGraphError::ReportRender {
            format: "json",
            message: e.to_string(),
        })
    }
}

/// A set of suites, the root of a JUnit document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestSuites {
    /// The suites.
    pub suites: Vec<TestSuite>,
}

impl From<TestSuite> for TestSuites {
    fn from(suite: TestSuite) -> Self {
        Self {
            suites: vec![suite],
        }
    }
}

fn as_secs<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
