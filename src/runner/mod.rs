//! Step graph execution.

pub mod dependency;
pub mod executor;
pub mod outcome;

pub use dependency::{count_nodes, graph_issues, satisfied, validate_graph, GraphIssue};
pub use executor::{run, Executor, RunProgress};
pub use outcome::{reason_counts, ExecutionError, Reason};
