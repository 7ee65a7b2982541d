//! Dependency satisfaction and graph validation.
//!
//! [`satisfied`] is the only check the executor performs. The rest of this
//! module lets callers reject graphs that could never finish before handing
//! them to the executor, which does not validate anything itself.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, StepGraphError};
use crate::steps::{node_key, Link, StepNode};

/// Returns true if every required link is present in `produced`.
///
/// Order and duplicates are irrelevant; an empty requirement list is always
/// satisfied.
pub fn satisfied(required: &[Link], produced: &[Link]) -> bool {
    required.iter().all(|link| produced.contains(link))
}

/// A reason a step may never be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    /// No step in the graph creates the link.
    MissingProducer { step: String, link: Link },
    /// The link is only created by steps that are not ancestors of the step,
    /// so it may or may not be present when the step is evaluated.
    UnorderedProducer { step: String, link: Link },
}

impl GraphIssue {
    /// Name of the step with the unmet requirement.
    pub fn step(&self) -> &str {
        match self {
            GraphIssue::MissingProducer { step, .. }
            | GraphIssue::UnorderedProducer { step, .. } => step,
        }
    }
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphIssue::MissingProducer { step, link } => {
                write!(f, "step '{}' requires '{}', which nothing creates", step, link)
            }
            GraphIssue::UnorderedProducer { step, link } => write!(
                f,
                "step '{}' requires '{}', which no ancestor creates",
                step, link
            ),
        }
    }
}

/// Distinct nodes reachable from the roots, with their parent edges.
struct Reachable<'a> {
    /// Nodes in discovery order (depth-first, children in declared order).
    nodes: Vec<&'a Arc<StepNode>>,
    /// Parent indices per node.
    parents: Vec<Vec<usize>>,
}

impl<'a> Reachable<'a> {
    fn collect(roots: &'a [Arc<StepNode>]) -> Self {
        let mut index: HashMap<usize, usize> = HashMap::new();
        let mut nodes = Vec::new();
        let mut parents: Vec<Vec<usize>> = Vec::new();
        let mut stack: Vec<(&'a Arc<StepNode>, Option<usize>)> =
            roots.iter().rev().map(|root| (root, None)).collect();

        while let Some((node, parent)) = stack.pop() {
            let key = node_key(node);
            if let Some(&existing) = index.get(&key) {
                if let Some(parent) = parent {
                    parents[existing].push(parent);
                }
                continue;
            }

            let idx = nodes.len();
            index.insert(key, idx);
            nodes.push(node);
            parents.push(parent.into_iter().collect());

            for child in node.children().iter().rev() {
                stack.push((child, Some(idx)));
            }
        }

        Self { nodes, parents }
    }

    /// Node indices with every node after all of its parents.
    fn topological_order(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = self.parents.iter().map(Vec::len).collect();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (child, parents) in self.parents.iter().enumerate() {
            for &parent in parents {
                children[parent].push(child);
            }
        }

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree == 0)
            .map(|(idx, _)| idx)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for &child in &children[idx] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    queue.push_back(child);
                }
            }
        }

        order
    }
}

/// Number of distinct nodes (by identity) reachable from the roots.
pub fn count_nodes(roots: &[Arc<StepNode>]) -> usize {
    Reachable::collect(roots).nodes.len()
}

/// Every requirement in the graph that is not guaranteed to be met.
///
/// A requirement created by some ancestor of a step is always present once
/// the step's last parent has completed successfully. Anything else is
/// reported, in depth-first discovery order.
pub fn graph_issues(roots: &[Arc<StepNode>]) -> Vec<GraphIssue> {
    let graph = Reachable::collect(roots);

    let all_created: HashSet<Link> = graph
        .nodes
        .iter()
        .flat_map(|node| node.step().creates())
        .collect();

    let mut upstream: Vec<HashSet<Link>> = vec![HashSet::new(); graph.nodes.len()];
    for idx in graph.topological_order() {
        let mut links = HashSet::new();
        for &parent in &graph.parents[idx] {
            links.extend(upstream[parent].iter().cloned());
            links.extend(graph.nodes[parent].step().creates());
        }
        upstream[idx] = links;
    }

    let mut issues = Vec::new();
    for (idx, node) in graph.nodes.iter().enumerate() {
        let step = node.step();
        let mut checked = HashSet::new();
        for link in step.requires() {
            if upstream[idx].contains(&link) || !checked.insert(link.clone()) {
                continue;
            }
            let issue = if all_created.contains(&link) {
                GraphIssue::UnorderedProducer {
                    step: step.name().to_string(),
                    link,
                }
            } else {
                GraphIssue::MissingProducer {
                    step: step.name().to_string(),
                    link,
                }
            };
            issues.push(issue);
        }
    }

    issues
}

/// Reject graphs with any [`GraphIssue`].
pub fn validate_graph(roots: &[Arc<StepNode>]) -> Result<()> {
    let issues = graph_issues(roots);
    if issues.is_empty() {
        return Ok(());
    }

    Err(StepGraphError::InvalidGraph {
        message: issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    })
}
