mod common;

use async_trait::async_trait;
use axum::{http::StatusCode, routing::get, Router};
use common::{linear_question, serve, single_call};
use flowrun::diagram::{Answers, CompiledDiagram, Diagram, Node, NodeKind};
use flowrun::runtime::http::HttpExecutor;
use flowrun::runtime::{
    spawn_session, ExecutorFailure, ExecutorRegistry, FlowEvent, FlowHandle, NodeExecutor, NodeStatus,
    RunSnapshot, RunState, RunningState, SessionTable, StopPolicy,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;

/// Holds every call until released
struct Gate {
    release: Arc<Notify>,
}

#[async_trait]
impl NodeExecutor for Gate {
    async fn execute(&self, _node: &Node, _answers: &Answers) -> Result<Value, ExecutorFailure> {
        self.release.notified().await;
        Ok(json!("released"))
    }
}

struct Panics;

#[async_trait]
impl NodeExecutor for Panics {
    async fn execute(&self, node: &Node, _answers: &Answers) -> Result<Value, ExecutorFailure> {
        panic!("executor for {} blew up", node.id)
    }
}

/// Echoes the answers it was given
struct Echo;

#[async_trait]
impl NodeExecutor for Echo {
    async fn execute(&self, _node: &Node, answers: &Answers) -> Result<Value, ExecutorFailure> {
        Ok(Value::Object(answers.clone()))
    }
}

fn start(diagram: Diagram, executors: ExecutorRegistry, policy: StopPolicy) -> FlowHandle {
    spawn_session(Arc::new(CompiledDiagram::compile(diagram).unwrap()), executors, policy)
}

async fn wait_until_finished(handle: &FlowHandle) -> RunSnapshot {
    timeout(
        Duration::from_secs(5),
        handle.wait_for(|snapshot| snapshot.state.is_terminal()),
    )
    .await
    .expect("run did not finish in time")
    .unwrap()
}

#[tokio::test]
async fn drives_a_question_run_through_the_handle() {
    let handle = start(linear_question(), ExecutorRegistry::new(), StopPolicy::Cancel);
    assert_eq!(handle.snapshot().state, RunState::Idle);

    let waiting = handle.send(FlowEvent::Start).await.unwrap();
    assert_eq!(waiting.state, RunState::Running(RunningState::WaitingInput));

    let done = handle
        .send(FlowEvent::Answer {
            node_id: "q".into(),
            answer: json!("x"),
        })
        .await
        .unwrap();
    assert_eq!(done.state, RunState::Completed);
    assert_eq!(done.answers["q"], json!("x"));
    assert_eq!(handle.snapshot(), done);
}

#[tokio::test]
async fn executor_receives_answers_and_its_result_is_recorded() {
    let mut diagram = single_call(NodeKind::HttpRequest, json!({}));
    diagram.nodes.insert(1, Node::new("q", NodeKind::Question));
    diagram.edges = vec![
        flowrun::Edge::new("e1", "start", "q"),
        flowrun::Edge::new("e2", "q", "call"),
        flowrun::Edge::new("e3", "call", "end"),
    ];
    let executors = ExecutorRegistry::new().with(NodeKind::HttpRequest, Arc::new(Echo));
    let handle = start(diagram, executors, StopPolicy::Cancel);

    handle.send(FlowEvent::Start).await.unwrap();
    handle
        .send(FlowEvent::Answer {
            node_id: "q".into(),
            answer: json!(42),
        })
        .await
        .unwrap();

    let done = wait_until_finished(&handle).await;
    assert_eq!(done.state, RunState::Completed);
    assert_eq!(done.answers["call"], json!({ "q": 42 }));
    assert_eq!(done.node_statuses["call"], NodeStatus::Executed);
}

#[tokio::test]
async fn http_500_marks_node_error_and_run_continues() {
    let upstream = serve(Router::new().route(
        "/fail",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "nope") }),
    ))
    .await;
    let executors = ExecutorRegistry::new().with(
        NodeKind::HttpRequest,
        Arc::new(HttpExecutor::new(reqwest::Client::new())),
    );
    let handle = start(
        single_call(
            NodeKind::HttpRequest,
            json!({ "endpoint": upstream.url("/fail"), "method": "GET", "responseType": "json" }),
        ),
        executors,
        StopPolicy::Cancel,
    );

    handle.send(FlowEvent::Start).await.unwrap();
    let done = wait_until_finished(&handle).await;

    assert_eq!(done.state, RunState::Completed);
    assert_eq!(done.answers["call"], json!({ "error": "HTTP 500" }));
    assert_eq!(done.node_statuses["call"], NodeStatus::Error);
    assert_eq!(done.node_statuses["end"], NodeStatus::Executed);
}

#[tokio::test]
async fn panicking_executor_is_recorded_as_failure() {
    let executors = ExecutorRegistry::new().with(NodeKind::Puter, Arc::new(Panics));
    let handle = start(single_call(NodeKind::Puter, json!({})), executors, StopPolicy::Cancel);

    handle.send(FlowEvent::Start).await.unwrap();
    let done = wait_until_finished(&handle).await;

    assert_eq!(done.state, RunState::Completed);
    assert_eq!(done.node_statuses["call"], NodeStatus::Error);
    let error = done.answers["call"]["error"].as_str().unwrap();
    assert!(error.contains("blew up"), "unexpected error: {}", error);
}

#[tokio::test]
async fn missing_executor_is_recorded_as_failure() {
    let handle = start(
        single_call(NodeKind::Gemini, json!({})),
        ExecutorRegistry::new(),
        StopPolicy::Cancel,
    );

    handle.send(FlowEvent::Start).await.unwrap();
    let done = wait_until_finished(&handle).await;
    assert_eq!(done.state, RunState::Completed);
    assert_eq!(done.node_statuses["call"], NodeStatus::Error);
}

#[tokio::test]
async fn stop_with_cancel_policy_aborts_the_call() {
    let release = Arc::new(Notify::new());
    let executors = ExecutorRegistry::new().with(
        NodeKind::HttpRequest,
        Arc::new(Gate {
            release: Arc::clone(&release),
        }),
    );
    let handle = start(single_call(NodeKind::HttpRequest, json!({})), executors, StopPolicy::Cancel);

    let processing = handle.send(FlowEvent::Start).await.unwrap();
    assert_eq!(processing.state, RunState::Running(RunningState::ProcessingHttp));

    let stopped = handle.send(FlowEvent::Stop).await.unwrap();
    assert_eq!(stopped.state, RunState::Stopped);
    assert_eq!(stopped.node_statuses["call"], NodeStatus::Error);
    assert!(!stopped.answers.contains_key("call"));

    release.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.snapshot(), stopped);
}

#[tokio::test]
async fn stop_with_drain_policy_waits_for_the_call() {
    let release = Arc::new(Notify::new());
    let executors = ExecutorRegistry::new().with(
        NodeKind::HttpRequest,
        Arc::new(Gate {
            release: Arc::clone(&release),
        }),
    );
    let handle = start(single_call(NodeKind::HttpRequest, json!({})), executors, StopPolicy::Drain);

    handle.send(FlowEvent::Start).await.unwrap();
    let draining = handle.send(FlowEvent::Stop).await.unwrap();
    assert_eq!(draining.state, RunState::Running(RunningState::ProcessingHttp));

    release.notify_one();
    let stopped = wait_until_finished(&handle).await;
    assert_eq!(stopped.state, RunState::Stopped);
    assert_eq!(stopped.answers["call"], json!("released"));
    assert_eq!(stopped.node_statuses["call"], NodeStatus::Executed);
    assert_eq!(stopped.node_statuses["end"], NodeStatus::Idle);
}

#[tokio::test]
async fn shut_down_sessions_reject_events() {
    let handle = start(linear_question(), ExecutorRegistry::new(), StopPolicy::Cancel);
    handle.shutdown().await.unwrap();

    let result = timeout(Duration::from_secs(5), handle.send(FlowEvent::Start))
        .await
        .expect("send should not hang");
    assert!(result.is_err());
}

#[tokio::test]
async fn session_table_tracks_handles() {
    let table = SessionTable::new();
    let handle = start(linear_question(), ExecutorRegistry::new(), StopPolicy::Cancel);
    let id = handle.id();

    table.insert(handle).await.unwrap();
    assert_eq!(table.len().await, 1);
    assert!(table.get(&id).await.is_some());

    assert!(table.remove(&id).await.is_some());
    assert!(table.get(&id).await.is_none());
}

async fn finished_run() -> FlowHandle {
    let handle = start(linear_question(), ExecutorRegistry::new(), StopPolicy::Cancel);
    handle.send(FlowEvent::Start).await.unwrap();
    let done = handle
        .send(FlowEvent::Answer {
            node_id: "q".into(),
            answer: json!("x"),
        })
        .await
        .unwrap();
    assert_eq!(done.state, RunState::Completed);
    handle
}

/// Resolves once the session task has exited and dropped its snapshot channel
async fn session_ended(handle: &FlowHandle) -> bool {
    timeout(Duration::from_secs(5), handle.wait_for(|_| false))
        .await
        .expect("session task kept running")
        .is_err()
}

#[tokio::test]
async fn abandoned_finished_runs_are_evicted_and_their_tasks_end() {
    let table = SessionTable::with_limits(Duration::ZERO, 16);
    let handle = finished_run().await;
    table.insert(handle.clone()).await.unwrap();

    assert_eq!(table.evict_expired().await, vec![handle.id()]);
    assert_eq!(table.len().await, 0);
    assert!(table.get(&handle.id()).await.is_none());
    assert!(session_ended(&handle).await);
}

#[tokio::test]
async fn recently_used_runs_survive_eviction() {
    let table = SessionTable::with_limits(Duration::from_secs(3600), 16);
    let handle = finished_run().await;
    table.insert(handle.clone()).await.unwrap();

    assert!(table.evict_expired().await.is_empty());
    assert_eq!(table.len().await, 1);
    assert_eq!(handle.snapshot().state, RunState::Completed);
}

#[tokio::test]
async fn sweeper_reclaims_expired_runs_in_the_background() {
    let table = Arc::new(SessionTable::with_limits(Duration::ZERO, 16));
    let sweeper = SessionTable::spawn_sweeper(&table, Duration::from_millis(10));
    let handle = finished_run().await;
    table.insert(handle.clone()).await.unwrap();

    assert!(session_ended(&handle).await);
    assert_eq!(table.len().await, 0);
    sweeper.abort();
}

#[tokio::test]
async fn full_table_rejects_and_shuts_down_new_runs() {
    let table = SessionTable::with_limits(Duration::from_secs(3600), 1);
    table.insert(finished_run().await).await.unwrap();

    let rejected = start(linear_question(), ExecutorRegistry::new(), StopPolicy::Cancel);
    assert!(table.insert(rejected.clone()).await.is_err());
    assert_eq!(table.len().await, 1);
    assert!(table.get(&rejected.id()).await.is_none());
    assert!(session_ended(&rejected).await);
}
