//! Integration tests for step graph execution.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stepgraph::config::{DispatchPolicy, RunOptions};
use stepgraph::report::TestCase;
use stepgraph::runner::{count_nodes, reason_counts, run, Executor, Reason, RunProgress};
use stepgraph::steps::{links, Link, MockStep, RunLog, Step, StepNode, SubTestReporter};
use tempfile::TempDir;
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;

fn node(step: MockStep) -> Arc<StepNode> {
    Arc::new(StepNode::new(step))
}

fn node_with(step: MockStep, children: Vec<Arc<StepNode>>) -> Arc<StepNode> {
    Arc::new(StepNode::new(step).with_children(children))
}

async fn within_timeout<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("run did not finish in time")
}

#[tokio::test]
async fn independent_roots_start_concurrently() {
    let log = RunLog::new();
    // Every root waits until all four are inside `run`, so this only
    // finishes if none of them is gated on another's completion.
    let barrier = Arc::new(Barrier::new(4));
    let roots: Vec<_> = (0..4)
        .map(|i| {
            node(
                MockStep::new(format!("root-{}", i))
                    .gate(Arc::clone(&barrier))
                    .with_log(&log),
            )
        })
        .collect();

    let (suite, errors) = within_timeout(run(CancellationToken::new(), &roots, false)).await;

    assert!(errors.is_empty());
    assert_eq!(suite.num_tests, 4);
    assert_eq!(suite.test_cases.len(), 4);
    assert_eq!(suite.num_failed, 0);
    assert_eq!(log.records().len(), 4);
}

#[tokio::test]
async fn linear_chain_runs_in_dependency_order() {
    let log = RunLog::new();
    let c = node(MockStep::new("c").requiring(["b"]).with_log(&log));
    let b = node_with(
        MockStep::new("b")
            .requiring(["a"])
            .creating(["b"])
            .delay(Duration::from_millis(20))
            .with_log(&log),
        vec![c],
    );
    let a = node_with(
        MockStep::new("a")
            .creating(["a"])
            .delay(Duration::from_millis(20))
            .with_log(&log),
        vec![b],
    );

    let (suite, errors) = within_timeout(run(CancellationToken::new(), &[a], false)).await;

    assert!(errors.is_empty());
    assert_eq!(suite.num_tests, 3);
    assert_eq!(log.names(), vec!["a", "b", "c"]);

    let end_a = log.finished("a").unwrap();
    let start_b = log.started("b").unwrap();
    let end_b = log.finished("b").unwrap();
    let start_c = log.started("c").unwrap();
    assert!(start_b >= end_a);
    assert!(end_b >= end_a);
    assert!(start_c >= end_b);
}

#[tokio::test]
async fn failure_is_isolated_to_its_subtree() {
    let log = RunLog::new();
    let c = node(
        MockStep::new("c")
            .requiring(["a"])
            .described_as("Dependent of a")
            .with_log(&log),
    );
    let a = node_with(
        MockStep::new("a").creating(["a"]).fails("boom").with_log(&log),
        vec![c],
    );
    let d = node(MockStep::new("d").described_as("Independent").with_log(&log));

    let (suite, errors) = within_timeout(run(CancellationToken::new(), &[a, d], false)).await;

    assert_eq!(log.runs_of("c"), 0);
    assert_eq!(log.runs_of("d"), 1);
    assert_eq!(suite.num_tests, 2);
    assert_eq!(suite.num_failed, 1);
    assert!(suite.test_cases.iter().all(|case| case.name != "Dependent of a"));

    let independent = suite
        .test_cases
        .iter()
        .find(|case| case.name == "Independent")
        .unwrap();
    assert!(!independent.is_failed());

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].reason(), Reason::StepFailed);
    assert_eq!(errors[0].step(), Some("a"));
    assert_eq!(errors[0].to_string(), "step a failed: boom");
}

#[tokio::test]
async fn failed_case_carries_error_text() {
    let root = node(MockStep::new("lint").fails("3 warnings"));

    let (suite, _) = within_timeout(run(CancellationToken::new(), &[root], false)).await;

    assert_eq!(suite.test_cases[0].failure.as_deref(), Some("3 warnings"));
}

#[tokio::test]
async fn failed_step_outputs_are_not_produced() {
    let log = RunLog::new();
    let joined = node(MockStep::new("joined").requiring(["x", "y"]).with_log(&log));
    let x = node(MockStep::new("x").creating(["x"]).fails("no x"));
    let y = node_with(MockStep::new("y").creating(["y"]), vec![joined]);

    let (suite, errors) = within_timeout(run(CancellationToken::new(), &[x, y], false)).await;

    assert_eq!(log.runs_of("joined"), 0);
    assert_eq!(suite.num_tests, 2);
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn cancellation_stops_dispatch_and_drains_in_flight() {
    let log = RunLog::new();
    let child = node(MockStep::new("child").requiring(["a"]).with_log(&log));
    // `a` finishes normally once cancelled; its completion arrives after
    // the cancellation and must not unlock `child`.
    let a = node_with(
        MockStep::new("a")
            .creating(["a"])
            .wait_for_cancel()
            .with_log(&log),
        vec![child],
    );
    // `b` is a well-behaved long step that gives up when cancelled.
    let b = node(
        MockStep::new("b")
            .delay(Duration::from_secs(60))
            .with_log(&log),
    );

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let (suite, errors) = within_timeout(run(token, &[a, b], false)).await;

    assert_eq!(log.runs_of("child"), 0);
    assert_eq!(suite.num_tests, 2);
    assert_eq!(suite.num_failed, 1);

    let counts = reason_counts(&errors);
    assert_eq!(counts.get(&Reason::Interrupted), Some(&1));
    assert_eq!(counts.get(&Reason::StepFailed), Some(&1));
    assert_eq!(errors[0].reason(), Reason::Interrupted);
    assert_eq!(errors[1].step(), Some("b"));
}

#[tokio::test]
async fn cancellation_drains_dispatched_child() {
    let log = RunLog::new();
    let grandchild = node(MockStep::new("grandchild").requiring(["child"]).with_log(&log));
    let child = node_with(
        MockStep::new("child")
            .requiring(["root"])
            .creating(["child"])
            .wait_for_cancel()
            .with_log(&log),
        vec![grandchild],
    );
    let roots = [node_with(MockStep::new("root").creating(["root"]), vec![child])];

    let token = CancellationToken::new();
    let canceller = token.clone();
    let executor = Executor::default();
    let run_fut = executor.run_with_progress(token, &roots, move |event| {
        if let RunProgress::StepStarting { name: "child" } = event {
            canceller.cancel();
        }
    });

    let (suite, errors) = within_timeout(run_fut).await;

    assert_eq!(log.runs_of("child"), 1);
    assert_eq!(log.runs_of("grandchild"), 0);
    assert_eq!(suite.num_tests, 2);
    assert_eq!(reason_counts(&errors).get(&Reason::Interrupted), Some(&1));
}

#[tokio::test]
async fn cancelled_before_start_runs_roots_only() {
    let log = RunLog::new();
    let child = node(MockStep::new("child").requiring(["a"]).with_log(&log));
    let a = node_with(MockStep::new("a").creating(["a"]).with_log(&log), vec![child]);

    let token = CancellationToken::new();
    token.cancel();

    let (suite, errors) = within_timeout(run(token, &[a], false)).await;

    assert_eq!(log.runs_of("a"), 1);
    assert_eq!(log.runs_of("child"), 0);
    assert_eq!(suite.num_tests, 1);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].reason(), Reason::Interrupted);
}

#[tokio::test]
async fn dry_run_marks_every_case_skipped() {
    let log = RunLog::new();
    let c = node(MockStep::new("c").requiring(["b"]).with_log(&log));
    let b = node_with(
        MockStep::new("b").requiring(["a"]).creating(["b"]).with_log(&log),
        vec![c],
    );
    let a = node_with(MockStep::new("a").creating(["a"]).with_log(&log), vec![b]);
    let d = node(MockStep::new("d").with_log(&log));
    let roots = [a, d];

    let (suite, errors) = within_timeout(run(CancellationToken::new(), &roots, true)).await;

    assert!(errors.is_empty());
    assert_eq!(suite.num_skipped, count_nodes(&roots));
    assert_eq!(suite.num_skipped, 4);
    assert!(suite
        .test_cases
        .iter()
        .all(|case| case.skipped.as_deref() == Some("Dry run")));
    assert!(log.records().iter().all(|record| record.dry_run));
}

#[tokio::test]
async fn dry_run_failure_is_reported_as_failure() {
    let root = node(MockStep::new("a").fails("cannot even pretend"));

    let (suite, errors) = within_timeout(run(CancellationToken::new(), &[root], true)).await;

    assert_eq!(suite.num_failed, 1);
    assert_eq!(suite.num_skipped, 0);
    assert_eq!(errors.len(), 1);
}

fn diamond(log: &RunLog) -> Arc<StepNode> {
    // Both parents create the link the shared child needs.
    let c = node(MockStep::new("c").requiring(["b"]).with_log(log));
    let b1 = node_with(
        MockStep::new("b1").requiring(["a"]).creating(["b"]).with_log(log),
        vec![Arc::clone(&c)],
    );
    let b2 = node_with(
        MockStep::new("b2").requiring(["a"]).creating(["b"]).with_log(log),
        vec![c],
    );
    node_with(
        MockStep::new("a").creating(["a"]).with_log(log),
        vec![b1, b2],
    )
}

#[tokio::test]
async fn diamond_child_runs_exactly_once() {
    let log = RunLog::new();
    let root = diamond(&log);

    let (suite, errors) = within_timeout(run(CancellationToken::new(), &[root], false)).await;

    assert!(errors.is_empty());
    assert_eq!(log.runs_of("c"), 1);
    assert_eq!(suite.num_tests, 4);
}

#[tokio::test]
async fn per_parent_edge_policy_reruns_diamond_child() {
    let log = RunLog::new();
    let root = diamond(&log);
    let executor = Executor::new(RunOptions {
        dispatch: DispatchPolicy::PerParentEdge,
        ..Default::default()
    });

    let (suite, errors) = within_timeout(executor.run(CancellationToken::new(), &[root])).await;

    assert!(errors.is_empty());
    assert_eq!(log.runs_of("c"), 2);
    assert_eq!(suite.num_tests, 5);
}

#[tokio::test]
async fn converging_child_waits_for_last_parent() {
    let log = RunLog::new();
    let c = node(MockStep::new("c").requiring(["b1", "b2"]).with_log(&log));
    let b1 = node_with(
        MockStep::new("b1").creating(["b1"]).with_log(&log),
        vec![Arc::clone(&c)],
    );
    let b2 = node_with(
        MockStep::new("b2")
            .creating(["b2"])
            .delay(Duration::from_millis(30))
            .with_log(&log),
        vec![c],
    );

    let (suite, _) = within_timeout(run(CancellationToken::new(), &[b1, b2], false)).await;

    assert_eq!(log.runs_of("c"), 1);
    assert!(log.started("c").unwrap() >= log.finished("b2").unwrap());
    assert_eq!(suite.num_tests, 3);
}

#[tokio::test]
async fn sub_tests_replace_synthesized_case() {
    let cases = vec![
        TestCase::new("conformance/networking", Duration::from_secs(3)),
        TestCase::new("conformance/storage", Duration::from_secs(2)).with_failure("timeout"),
        TestCase::new("conformance/upgrade", Duration::ZERO).with_skip("not applicable"),
    ];
    let root = node(
        MockStep::new("e2e")
            .described_as("Run e2e suite")
            .reporting(cases),
    );

    let (suite, errors) = within_timeout(run(CancellationToken::new(), &[root], false)).await;

    assert!(errors.is_empty());
    assert_eq!(suite.num_tests, 3);
    assert_eq!(suite.num_failed, 1);
    assert_eq!(suite.num_skipped, 1);
    assert!(suite.test_cases.iter().all(|case| case.name != "Run e2e suite"));
}

#[tokio::test]
async fn panicking_step_is_reported_as_failure() {
    let log = RunLog::new();
    let child = node(MockStep::new("child").requiring(["p"]).with_log(&log));
    let panicking = node_with(MockStep::new("p").creating(["p"]).panics("kaboom"), vec![child]);
    let other = node(MockStep::new("other").with_log(&log));

    let (suite, errors) =
        within_timeout(run(CancellationToken::new(), &[panicking, other], false)).await;

    assert_eq!(log.runs_of("other"), 1);
    assert_eq!(log.runs_of("child"), 0);
    assert_eq!(suite.num_tests, 2);
    assert_eq!(suite.num_failed, 1);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].step(), Some("p"));
    assert!(errors[0].to_string().contains("step panicked: kaboom"));
}

/// Runs fine, then panics while handing over its cases.
struct BrokenReporter;

#[async_trait]
impl Step for BrokenReporter {
    async fn run(&self, _ctx: &CancellationToken, _dry_run: bool) -> anyhow::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "broken-reporter"
    }

    fn description(&self) -> String {
        "Collect flaky results".to_string()
    }

    fn requires(&self) -> Vec<Link> {
        Vec::new()
    }

    fn creates(&self) -> Vec<Link> {
        links(["results"])
    }

    fn subtest_reporter(&self) -> Option<&dyn SubTestReporter> {
        Some(self)
    }
}

impl SubTestReporter for BrokenReporter {
    fn sub_tests(&self) -> Vec<TestCase> {
        panic!("results file truncated")
    }
}

#[tokio::test]
async fn panicking_sub_test_reporter_is_reported_as_failure() {
    let log = RunLog::new();
    let child = node(MockStep::new("child").requiring(["results"]).with_log(&log));
    let reporter = Arc::new(StepNode::new(BrokenReporter).with_child(child));
    let other = node(MockStep::new("other").with_log(&log));

    let (suite, errors) =
        within_timeout(run(CancellationToken::new(), &[reporter, other], false)).await;

    assert_eq!(log.runs_of("other"), 1);
    assert_eq!(log.runs_of("child"), 0);
    assert_eq!(suite.num_tests, 2);
    assert_eq!(suite.num_failed, 1);

    let case = suite
        .test_cases
        .iter()
        .find(|case| case.name == "Collect flaky results")
        .unwrap();
    assert!(case.is_failed());

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].step(), Some("broken-reporter"));
    assert!(errors[0]
        .to_string()
        .contains("step panicked: results file truncated"));
}

#[tokio::test]
async fn progress_events_follow_completion_order() {
    let b = node(MockStep::new("b").requiring(["a"]).fails("broken"));
    let a = node_with(MockStep::new("a").creating(["a"]), vec![b]);

    let mut events = Vec::new();
    let executor = Executor::default();
    within_timeout(
        executor.run_with_progress(CancellationToken::new(), &[a], |event| {
            events.push(match event {
                RunProgress::StepStarting { name } => format!("start {}", name),
                RunProgress::StepFinished { name, failed, .. } => {
                    format!("finish {} failed={}", name, failed)
                }
                RunProgress::Interrupted { in_flight } => format!("interrupted {}", in_flight),
            })
        }),
    )
    .await;

    assert_eq!(
        events,
        vec![
            "start a",
            "finish a failed=false",
            "start b",
            "finish b failed=true",
        ]
    );
}

#[tokio::test]
async fn writes_junit_report_when_configured() {
    let temp = TempDir::new().unwrap();
    let executor = Executor::new(RunOptions {
        suite_name: "ci".to_string(),
        junit_dir: Some(temp.path().to_path_buf()),
        ..Default::default()
    });
    let root = node(MockStep::new("build").described_as("Build binaries"));

    let (suite, _) = within_timeout(executor.run(CancellationToken::new(), &[root])).await;
    let path = executor.write_report(&suite).unwrap().unwrap();

    assert_eq!(path, temp.path().join("junit_ci.xml"));
    let xml = std::fs::read_to_string(path).unwrap();
    assert!(xml.contains(r#"name="Build binaries""#));
}

#[tokio::test]
async fn suite_duration_covers_the_run() {
    let root = node(MockStep::new("slow").delay(Duration::from_millis(30)));

    let (suite, _) = within_timeout(run(CancellationToken::new(), &[root], false)).await;

    assert!(suite.duration >= Duration::from_millis(30));
    assert!(suite.test_cases[0].duration >= Duration::from_millis(30));
}
