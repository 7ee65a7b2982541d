//! Concurrent execution of a step graph.
//!
//! One worker task runs per dispatched node. Workers report back over a
//! channel and never touch run state; the orchestrator loop is the only
//! place that reads completions, grows the produced-set, records cases and
//! errors, and dispatches newly runnable children. That single consumer is
//! what makes the shared state safe without locks.
//!
//! The loop waits on two sources, cancellation first:
//!
//! 1. the run's cancellation token, honoured once: it records one
//!    [`ExecutionError::Interrupted`] and stops all further dispatch, while
//!    steps already running are still awaited and reported;
//! 2. worker completions, which update the report and unlock children.
//!
//! It returns when every dispatched worker has reported.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::dependency::satisfied;
use super::outcome::ExecutionError;
use crate::config::{DispatchPolicy, RunOptions};
use crate::error::Result;
use crate::report::{write_junit, TestCase, TestSuite, TestSuites, DRY_RUN_MESSAGE};
use crate::steps::{node_key, Link, StepNode};

/// Progress events emitted during a run.
///
/// Delivered from the orchestrator loop, in the order the loop observes
/// them.
#[derive(Debug)]
pub enum RunProgress<'a> {
    /// A worker was dispatched for the step.
    StepStarting { name: &'a str },
    /// The step's worker reported back.
    StepFinished {
        name: &'a str,
        duration: Duration,
        failed: bool,
    },
    /// Cancellation was observed; no more steps will be dispatched.
    Interrupted { in_flight: usize },
}

/// Outcome of one worker.
struct Completion {
    node: Arc<StepNode>,
    duration: Duration,
    result: anyhow::Result<()>,
    sub_tests: Option<Vec<TestCase>>,
}

/// Runs step graphs with fixed [`RunOptions`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stepgraph::config::RunOptions;
/// use stepgraph::runner::Executor;
/// use stepgraph::steps::{MockStep, StepNode};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let test = Arc::new(StepNode::new(MockStep::new("test").requiring(["bin"])));
/// let build = Arc::new(
///     StepNode::new(MockStep::new("build").creating(["bin"])).with_child(test),
/// );
///
/// let executor = Executor::new(RunOptions {
///     suite_name: "ci".to_string(),
///     ..Default::default()
/// });
/// let (suite, errors) = executor.run(CancellationToken::new(), &[build]).await;
///
/// assert!(errors.is_empty());
/// assert_eq!(suite.name, "ci");
/// assert_eq!(suite.num_tests, 2);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Executor {
    options: RunOptions,
}

impl Executor {
    /// Create an executor.
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    /// The options runs use.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run the graph below `roots` to completion.
    ///
    /// Returns the report together with every error observed; the run never
    /// stops at the first failure. Cancelling `ctx` stops dispatching new
    /// steps but still waits for running ones, which receive the same token
    /// and are expected to return promptly.
    pub async fn run(
        &self,
        ctx: CancellationToken,
        roots: &[Arc<StepNode>],
    ) -> (TestSuite, Vec<ExecutionError>) {
        self.run_with_progress(ctx, roots, |_| {}).await
    }

    /// Run the graph below `roots` with a progress callback.
    pub async fn run_with_progress(
        &self,
        ctx: CancellationToken,
        roots: &[Arc<StepNode>],
        mut on_progress: impl FnMut(RunProgress<'_>),
    ) -> (TestSuite, Vec<ExecutionError>) {
        let start = Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut run = RunState::new(&self.options, ctx.clone(), tx);

        info!(
            roots = roots.len(),
            dry_run = self.options.dry_run,
            "Starting step graph run"
        );

        for root in roots {
            run.dispatch(root, &mut on_progress);
        }

        // `run` keeps a sender for dispatching, so `recv` never yields
        // `None` here and the completion branch stays enabled.
        while run.live > 0 {
            tokio::select! {
                biased;
                _ = ctx.cancelled(), if !run.interrupted => run.interrupt(&mut on_progress),
                Some(completion) = rx.recv() => run.complete(completion, &mut on_progress),
            }
        }

        let (mut suite, errors) = run.finish();
        suite.duration = start.elapsed();

        info!(
            tests = suite.num_tests,
            failed = suite.num_failed,
            skipped = suite.num_skipped,
            errors = errors.len(),
            elapsed = ?suite.duration,
            "Step graph run finished"
        );

        (suite, errors)
    }

    /// Write `suite` as JUnit XML into the configured `junit_dir`.
    ///
    /// Returns the path written, or `None` when no directory is configured.
    pub fn write_report(&self, suite: &TestSuite) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.options.junit_dir else {
            return Ok(None);
        };

        let suites = TestSuites::from(suite.clone());
        let path = write_junit(&suites, dir, &suite.name)?;
        debug!(path = %path.display(), "Wrote JUnit report");
        Ok(Some(path))
    }
}

/// Run the graph below `roots` with default options and the given dry-run
/// flag. See [`Executor::run`].
pub async fn run(
    ctx: CancellationToken,
    roots: &[Arc<StepNode>],
    dry_run: bool,
) -> (TestSuite, Vec<ExecutionError>) {
    Executor::new(RunOptions {
        dry_run,
        ..Default::default()
    })
    .run(ctx, roots)
    .await
}

/// Everything the orchestrator loop owns for one run.
struct RunState<'o> {
    options: &'o RunOptions,
    ctx: CancellationToken,
    tx: mpsc::UnboundedSender<Completion>,
    /// Links created by successful steps, in completion order.
    produced: Vec<Link>,
    /// Identities of nodes dispatched so far.
    dispatched: HashSet<usize>,
    suite: TestSuite,
    errors: Vec<ExecutionError>,
    interrupted: bool,
    /// Dispatched workers that have not reported yet.
    live: usize,
}

impl<'o> RunState<'o> {
    fn new(
        options: &'o RunOptions,
        ctx: CancellationToken,
        tx: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        Self {
            options,
            ctx,
            tx,
            produced: Vec::new(),
            dispatched: HashSet::new(),
            suite: TestSuite::new(options.suite_name.clone()),
            errors: Vec::new(),
            interrupted: false,
            live: 0,
        }
    }

    fn dispatch<F>(&mut self, node: &Arc<StepNode>, on_progress: &mut F)
    where
        F: FnMut(RunProgress<'_>),
    {
        let name = node.step().name();

        if !self.dispatched.insert(node_key(node)) {
            match self.options.dispatch {
                DispatchPolicy::Once => {
                    debug!(step = name, "Step already dispatched");
                    return;
                }
                DispatchPolicy::PerParentEdge => {
                    warn!(step = name, "Dispatching step again through another parent");
                }
            }
        }

        debug!(step = name, "Dispatching step");
        on_progress(RunProgress::StepStarting { name });
        self.live += 1;
        spawn_worker(
            Arc::clone(node),
            self.ctx.clone(),
            self.options.dry_run,
            self.tx.clone(),
        );
    }

    fn interrupt<F>(&mut self, on_progress: &mut F)
    where
        F: FnMut(RunProgress<'_>),
    {
        warn!(
            in_flight = self.live,
            "Execution cancelled, waiting for running steps"
        );
        self.errors.push(ExecutionError::Interrupted);
        self.interrupted = true;
        on_progress(RunProgress::Interrupted {
            in_flight: self.live,
        });
    }

    fn complete<F>(&mut self, completion: Completion, on_progress: &mut F)
    where
        F: FnMut(RunProgress<'_>),
    {
        let Completion {
            node,
            duration,
            result,
            sub_tests,
        } = completion;
        let step = node.step();
        let mut case = TestCase::new(step.description(), duration);

        on_progress(RunProgress::StepFinished {
            name: step.name(),
            duration,
            failed: result.is_err(),
        });

        match result {
            Err(err) => {
                let output = format!("{:#}", err);
                warn!(step = step.name(), error = %output, "Step failed");
                case = case.with_failure(output);
                self.errors.push(ExecutionError::step_failed(step.name(), err));
            }
            Ok(()) => {
                debug!(step = step.name(), ?duration, "Step succeeded");
                if self.options.dry_run {
                    case = case.with_skip(DRY_RUN_MESSAGE);
                }
                self.produced.extend(step.creates());

                if self.interrupted {
                    debug!(step = step.name(), "Run interrupted, not unlocking children");
                } else {
                    for child in node.children() {
                        if satisfied(&child.step().requires(), &self.produced) {
                            self.dispatch(child, on_progress);
                        }
                    }
                }
            }
        }

        match sub_tests {
            Some(cases) if !cases.is_empty() => {
                for sub_case in cases {
                    self.suite.record(sub_case);
                }
            }
            _ => self.suite.record(case),
        }

        self.live -= 1;
    }

    fn finish(self) -> (TestSuite, Vec<ExecutionError>) {
        (self.suite, self.errors)
    }
}

/// Run one node's step and report exactly one completion.
fn spawn_worker(
    node: Arc<StepNode>,
    ctx: CancellationToken,
    dry_run: bool,
    tx: mpsc::UnboundedSender<Completion>,
) {
    let span = info_span!("step", name = %node.step().name());

    tokio::spawn(
        async move {
            let step = node.step();
            let start = Instant::now();
            // Every call into the step stays inside the unwind boundary.
            let outcome = AssertUnwindSafe(async {
                let result = step.run(&ctx, dry_run).await;
                let sub_tests = step.subtest_reporter().map(|reporter| reporter.sub_tests());
                (result, sub_tests)
            })
            .catch_unwind()
            .await;
            let (result, sub_tests) = match outcome {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    (Err(anyhow!("step panicked: {}", message)), None)
                }
            };
            let duration = start.elapsed();

            let completion = Completion {
                node,
                duration,
                result,
                sub_tests,
            };
            if tx.send(completion).is_err() {
                debug!("Run ended before the step reported");
            }
        }
        .instrument(span),
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
