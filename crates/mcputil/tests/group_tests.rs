//! Multi-session aggregation over in-memory transports.

mod support;

use std::sync::Arc;

use serde_json::json;

use mcputil::{CallEvent, CallId, Error, Group, Transport, codegen};
use support::MockServer;

async fn math_and_progress() -> (Group, MockServer, MockServer) {
    let math = MockServer::start(&["add"]);
    let progress = MockServer::start(&["long_running_task"]);
    let group = Group::connect([
        (
            "math".to_owned(),
            Arc::clone(&math.transport) as Arc<dyn Transport>,
        ),
        (
            "progress".to_owned(),
            Arc::clone(&progress.transport) as Arc<dyn Transport>,
        ),
    ])
    .await
    .unwrap();
    (group, math, progress)
}

#[tokio::test]
async fn tools_are_tagged_with_their_session() {
    let (group, _math, _progress) = math_and_progress().await;

    let tools = group.tools().await.unwrap();
    let tagged: Vec<(&str, &str)> = tools
        .iter()
        .map(|t| (t.session_name().unwrap(), t.name()))
        .collect();
    assert_eq!(
        tagged,
        vec![("math", "add"), ("progress", "long_running_task")]
    );

    group.close().await;
}

#[tokio::test]
async fn calls_route_to_the_named_session() {
    let (group, _math, _progress) = math_and_progress().await;

    let output = group
        .call_tool("math", "add", json!({"a": 3, "b": 4}), None)
        .await
        .unwrap()
        .output()
        .await
        .unwrap();
    assert_eq!(output, json!("7"));

    group.close().await;
}

#[tokio::test]
async fn sessions_run_independent_calls_concurrently() {
    let (group, _math, _progress) = math_and_progress().await;

    let math_call = group.call_tool("math", "add", json!({"a": 20, "b": 22}), None);
    let progress_call = group.call_tool(
        "progress",
        "long_running_task",
        json!({"task_name": "sync", "steps": 3}),
        Some(CallId::new("sync-1")),
    );
    let (math_stream, progress_stream) = tokio::join!(math_call, progress_call);
    let mut progress_stream = progress_stream.unwrap();

    let drain_progress = async {
        let mut count = 0;
        let mut output = None;
        while let Some(event) = progress_stream.next().await {
            match event.unwrap() {
                CallEvent::Progress(_) => count += 1,
                CallEvent::Output(value) => output = Some(value),
            }
        }
        (count, output)
    };
    let (math_output, (progress_count, progress_output)) =
        tokio::join!(math_stream.unwrap().output(), drain_progress);

    assert_eq!(math_output.unwrap(), json!("42"));
    assert_eq!(progress_count, 3);
    assert_eq!(progress_output, Some(json!("Task 'sync' completed")));

    group.close().await;
}

#[tokio::test]
async fn unknown_session_fails_before_dispatch() {
    let (group, math, _progress) = math_and_progress().await;

    let err = group
        .call_tool("calc", "add", json!({"a": 1, "b": 1}), None)
        .await
        .unwrap_err();
    match err {
        Error::UnknownSession { name, available } => {
            assert_eq!(name, "calc");
            assert_eq!(available, vec!["math".to_owned(), "progress".to_owned()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        math.calls_received.load(std::sync::atomic::Ordering::SeqCst),
        0
    );

    group.close().await;
}

#[tokio::test]
async fn duplicate_tool_names_across_sessions_coexist() {
    let left = MockServer::start(&["add"]);
    let right = MockServer::start(&["add"]);
    let group = Group::connect([
        (
            "left".to_owned(),
            Arc::clone(&left.transport) as Arc<dyn Transport>,
        ),
        (
            "right".to_owned(),
            Arc::clone(&right.transport) as Arc<dyn Transport>,
        ),
    ])
    .await
    .unwrap();

    let tools = group.tools().await.unwrap();
    assert_eq!(tools.len(), 2);
    assert!(tools.iter().all(|t| t.name() == "add"));
    assert_ne!(tools[0].session_name(), tools[1].session_name());

    let output = group
        .call_tool("right", "add", json!({"a": 5, "b": 5}), None)
        .await
        .unwrap()
        .output()
        .await
        .unwrap();
    assert_eq!(output, json!("10"));

    group.close().await;
}

#[tokio::test]
async fn catalog_rendering_is_stable_across_snapshots() {
    let (group, _math, _progress) = math_and_progress().await;

    let first = codegen::render_group(&group.catalogs().await.unwrap());
    group.invalidate_catalogs();
    let second = codegen::render_group(&group.catalogs().await.unwrap());

    assert_eq!(first, second);
    let math_at = first.find("session math").unwrap();
    let progress_at = first.find("session progress").unwrap();
    assert!(math_at < progress_at);
    assert!(first.contains("add(a: integer, b: integer) -> number"));

    group.close().await;
}

#[tokio::test]
async fn session_lookup_exposes_members() {
    let (group, _math, _progress) = math_and_progress().await;

    let session = group.session("math").unwrap();
    let output = session
        .invoke("add", json!({"a": 0, "b": 9}), None)
        .await
        .unwrap()
        .output()
        .await
        .unwrap();
    assert_eq!(output, json!("9"));

    group.close().await;
}
