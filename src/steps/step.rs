//! The step contract and the graph nodes that carry steps.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::link::Link;
use crate::report::TestCase;

/// One schedulable unit of pipeline work.
///
/// Implementations are driven by the executor: `run` is called at most once
/// per dispatch, from a worker task, with the run's shared cancellation token.
/// Cancellation is cooperative. A step that ignores the token keeps the run
/// waiting until it returns.
#[async_trait]
pub trait Step: Send + Sync {
    /// Perform the work. In dry-run mode the step should only pretend.
    async fn run(&self, ctx: &CancellationToken, dry_run: bool) -> anyhow::Result<()>;

    /// Short machine-friendly name, used in logs and error messages.
    fn name(&self) -> &str;

    /// Human readable description, used as the test case name.
    fn description(&self) -> String;

    /// Links that must all be produced before this step may start.
    fn requires(&self) -> Vec<Link>;

    /// Links this step produces when it succeeds.
    fn creates(&self) -> Vec<Link>;

    /// Exposes the granular-results capability, if the step has it.
    fn subtest_reporter(&self) -> Option<&dyn SubTestReporter> {
        None
    }
}

/// Optional capability for steps that report several test cases instead of
/// one aggregate case.
pub trait SubTestReporter {
    /// Cases to report in place of the step's own case. An empty list means
    /// the step's own case is reported.
    fn sub_tests(&self) -> Vec<TestCase>;
}

/// A step plus the nodes that may become runnable once it completes.
///
/// Node identity is the `Arc` allocation: the same node may be a child of
/// several parents, and the executor tells nodes apart by pointer, not by
/// step name.
pub struct StepNode {
    step: Box<dyn Step>,
    children: Vec<Arc<StepNode>>,
}

impl StepNode {
    /// Create a node without children.
    pub fn new(step: impl Step + 'static) -> Self {
        Self::from_boxed(Box::new(step))
    }

    /// Create a node from an already boxed step.
    pub fn from_boxed(step: Box<dyn Step>) -> Self {
        Self {
            step,
            children: Vec::new(),
        }
    }

    /// Add a child node.
    pub fn with_child(mut self, child: Arc<StepNode>) -> Self {
        self.children.push(child);
        self
    }

    /// Add several child nodes, keeping their order.
    pub fn with_children(mut self, children: impl IntoIterator<Item = Arc<StepNode>>) -> Self {
        self.children.extend(children);
        self
    }

    /// The step this node runs.
    pub fn step(&self) -> &dyn Step {
        self.step.as_ref()
    }

    /// Child nodes in declaration order.
    pub fn children(&self) -> &[Arc<StepNode>] {
        &self.children
    }
}

impl fmt::Debug for StepNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepNode")
            .field("step", &self.step.name())
            .field(
                "children",
                &self
                    .children
                    .iter()
                    .map(|c| c.step.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Identity of a node within one run.
pub(crate) fn node_key(node: &Arc<StepNode>) -> usize {
    Arc::as_ptr(node) as usize
}
