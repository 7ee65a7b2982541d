//! Steps and the graph they form.
//!
//! - [`Step`] - The unit of work the executor drives
//! - [`SubTestReporter`] - Optional capability for reporting granular cases
//! - [`StepNode`] - A step plus the children it may unlock
//! - [`Link`] - Opaque token for a produced or consumed artifact
//! - [`MockStep`] - Scripted step for tests
//!
//! Graphs are built bottom-up: children are wrapped in `Arc` before their
//! parents, so a child shared by two parents is the same node under both.
//!
//! ```
//! use std::sync::Arc;
//! use stepgraph::steps::{MockStep, StepNode};
//!
//! let test = Arc::new(StepNode::new(MockStep::new("test").requiring(["bin"])));
//! let build = StepNode::new(MockStep::new("build").creating(["bin"])).with_child(test);
//!
//! assert_eq!(build.children().len(), 1);
//! ```

pub mod link;
pub mod mock;
pub mod step;

pub use link::{links, Link};
pub use mock::{MockOutcome, MockStep, RunLog, RunRecord};
pub use step::{Step, StepNode, SubTestReporter};

pub(crate) use step::node_key;
