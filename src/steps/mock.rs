//! Mock step implementation for testing.
//!
//! `MockStep` implements the [`Step`] trait with scripted behaviour and
//! records every run in a shared [`RunLog`] for later assertion.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stepgraph::runner::run;
//! use stepgraph::steps::{MockStep, RunLog, StepNode};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let log = RunLog::new();
//! let build = Arc::new(StepNode::new(
//!     MockStep::new("build").creating(["bin"]).with_log(&log),
//! ));
//!
//! let (suite, errors) = run(CancellationToken::new(), &[build], false).await;
//!
//! assert!(errors.is_empty());
//! assert_eq!(suite.num_tests, 1);
//! assert_eq!(log.runs_of("build"), 1);
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;

use super::link::{links, Link};
use super::step::{Step, SubTestReporter};
use crate::report::TestCase;

/// How a mock step ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MockOutcome {
    /// Return `Ok(())`.
    #[default]
    Succeed,
    /// Return an error with this message.
    Fail(String),
    /// Panic with this message.
    Panic(String),
}

/// One recorded run of a mock step.
#[derive(Debug, Clone)]
pub struct RunRecord {
    /// Step name.
    pub name: String,
    /// Dry-run flag the step was called with.
    pub dry_run: bool,
    /// When `run` was entered.
    pub started: Instant,
    /// When `run` returned (`None` while running or after a panic).
    pub finished: Option<Instant>,
}

/// Shared, clonable log of mock step runs.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    records: Arc<Mutex<Vec<RunRecord>>>,
}

impl RunLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records in start order.
    pub fn records(&self) -> Vec<RunRecord> {
        self.lock().clone()
    }

    /// How many times the named step was started.
    pub fn runs_of(&self, name: &str) -> usize {
        self.lock().iter().filter(|r| r.name == name).count()
    }

    /// When the named step was first started.
    pub fn started(&self, name: &str) -> Option<Instant> {
        self.lock()
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.started)
    }

    /// When the named step first returned.
    pub fn finished(&self, name: &str) -> Option<Instant> {
        self.lock()
            .iter()
            .find(|r| r.name == name)
            .and_then(|r| r.finished)
    }

    /// Names of started steps in start order.
    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.name.clone()).collect()
    }

    fn start(&self, name: &str, dry_run: bool) -> usize {
        let mut records = self.lock();
        records.push(RunRecord {
            name: name.to_string(),
            dry_run,
            started: Instant::now(),
            finished: None,
        });
        records.len() - 1
    }

    fn finish(&self, index: usize) {
        if let Some(record) = self.lock().get_mut(index) {
            record.finished = Some(Instant::now());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RunRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scripted [`Step`] for tests.
///
/// Runs in this order: wait on the gate (if any), wait for cancellation (if
/// asked to), sleep for the delay (returning early with an error when the
/// token is cancelled), then finish with the configured outcome.
#[derive(Debug, Clone)]
pub struct MockStep {
    name: String,
    description: Option<String>,
    requires: Vec<Link>,
    creates: Vec<Link>,
    outcome: MockOutcome,
    delay: Option<Duration>,
    gate: Option<Arc<Barrier>>,
    wait_for_cancel: bool,
    sub_tests: Vec<TestCase>,
    log: RunLog,
}

impl MockStep {
    /// Create a step that succeeds immediately.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            requires: Vec::new(),
            creates: Vec::new(),
            outcome: MockOutcome::Succeed,
            delay: None,
            gate: None,
            wait_for_cancel: false,
            sub_tests: Vec::new(),
            log: RunLog::new(),
        }
    }

    /// Set the description (defaults to `Run <name>`).
    pub fn described_as(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the required links.
    pub fn requiring<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = links(ids);
        self
    }

    /// Set the created links.
    pub fn creating<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.creates = links(ids);
        self
    }

    /// Fail with the given message.
    pub fn fails(mut self, message: impl Into<String>) -> Self {
        self.outcome = MockOutcome::Fail(message.into());
        self
    }

    /// Panic with the given message.
    pub fn panics(mut self, message: impl Into<String>) -> Self {
        self.outcome = MockOutcome::Panic(message.into());
        self
    }

    /// Sleep before finishing.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Wait on a barrier before finishing.
    pub fn gate(mut self, barrier: Arc<Barrier>) -> Self {
        self.gate = Some(barrier);
        self
    }

    /// Block until the run's token is cancelled, then finish normally.
    pub fn wait_for_cancel(mut self) -> Self {
        self.wait_for_cancel = true;
        self
    }

    /// Report these cases instead of the step's own case.
    pub fn reporting(mut self, cases: Vec<TestCase>) -> Self {
        self.sub_tests = cases;
        self
    }

    /// Record runs into a shared log.
    pub fn with_log(mut self, log: &RunLog) -> Self {
        self.log = log.clone();
        self
    }
}

#[async_trait]
impl Step for MockStep {
    async fn run(&self, ctx: &CancellationToken, dry_run: bool) -> anyhow::Result<()> {
        let record = self.log.start(&self.name, dry_run);

        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        if self.wait_for_cancel {
            ctx.cancelled().await;
        }
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = ctx.cancelled() => {
                    self.log.finish(record);
                    return Err(anyhow!("{} cancelled", self.name));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        match &self.outcome {
            MockOutcome::Succeed => {
                self.log.finish(record);
                Ok(())
            }
            MockOutcome::Fail(message) => {
                self.log.finish(record);
                Err(anyhow!("{}", message))
            }
            MockOutcome::Panic(message) => panic!("{}", message),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("Run {}", self.name))
    }

    fn requires(&self) -> Vec<Link> {
        self.requires.clone()
    }

    fn creates(&self) -> Vec<Link> {
        self.creates.clone()
    }

    fn subtest_reporter(&self) -> Option<&dyn SubTestReporter> {
        if self.sub_tests.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl SubTestReporter for MockStep {
    fn sub_tests(&self) -> Vec<TestCase> {
        self.sub_tests.clone()
    }
}
