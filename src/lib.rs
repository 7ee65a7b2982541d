//! stepgraph - Dependency-aware concurrent executor for pipeline steps.
//!
//! Runs a graph of build and test steps with as much parallelism as their
//! declared dependencies allow. Every step whose required links are produced
//! starts immediately; a failing step only blocks its own dependents; a
//! cancelled run stops dispatching but still reports everything that ran.
//!
//! # Modules
//!
//! - [`config`] - Run options, file loading and environment overrides
//! - [`error`] - Error types and result aliases
//! - [`logging`] - Tracing subscriber setup
//! - [`report`] - Test suite reports, JSON and JUnit XML output
//! - [`runner`] - The executor, dependency checks and graph validation
//! - [`steps`] - The step contract, graph nodes and links
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stepgraph::runner::{run, validate_graph};
//! use stepgraph::steps::{MockStep, StepNode};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let unit = Arc::new(StepNode::new(MockStep::new("unit").requiring(["bin"])));
//! let e2e = Arc::new(StepNode::new(
//!     MockStep::new("e2e").requiring(["bin"]).fails("cluster unreachable"),
//! ));
//! let build = Arc::new(
//!     StepNode::new(MockStep::new("build").creating(["bin"])).with_children([unit, e2e]),
//! );
//! let roots = [build];
//! validate_graph(&roots).unwrap();
//!
//! let (suite, errors) = run(CancellationToken::new(), &roots, false).await;
//!
//! assert_eq!(suite.num_tests, 3);
//! assert_eq!(suite.num_failed, 1);
//! assert_eq!(errors.len(), 1);
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod report;
pub mod runner;
pub mod steps;

pub use error::{Result, StepGraphError};
