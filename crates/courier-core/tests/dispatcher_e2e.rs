//! Dispatcher end to end: real reqwest sink, stub HTTP targets.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;

use courier_core::config::DispatcherConfig;
use courier_core::domain::{ExecutionHistoryEntry, ExecutionStatus, HttpMethod, TaskSubmission};
use courier_core::impls::{ReqwestSink, StaticTokenProvider};
use courier_core::queue::BackoffPolicy;
use courier_core::Dispatcher;

#[derive(Default)]
struct Received {
    calls: usize,
    fail_first: usize,
    authorization: Option<String>,
    content_type: Option<String>,
    body: String,
}

type Shared = Arc<Mutex<Received>>;

async fn hook(State(state): State<Shared>, headers: HeaderMap, body: String) -> (StatusCode, String) {
    let mut state = state.lock().unwrap();
    state.calls += 1;
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    state.authorization = header("authorization");
    state.content_type = header("content-type");
    state.body = body;
    if state.calls <= state.fail_first {
        (StatusCode::SERVICE_UNAVAILABLE, "try later".to_string())
    } else {
        (StatusCode::OK, "ok".to_string())
    }
}

async fn start_target(fail_first: usize) -> (String, Shared) {
    let state = Shared::new(Mutex::new(Received {
        fail_first,
        ..Received::default()
    }));
    let app = Router::new()
        .route("/hook", post(hook))
        .with_state(Arc::clone(&state));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("target server");
    });
    (format!("http://{addr}/hook"), state)
}

fn fast_config(max_retries: u32) -> DispatcherConfig {
    DispatcherConfig {
        poll_interval: Duration::from_millis(10),
        error_interval: Duration::from_millis(50),
        max_retries,
        backoff: BackoffPolicy::new(2.0, Duration::from_millis(10), Duration::from_millis(50))
            .expect("backoff"),
        request_timeout: Duration::from_secs(2),
        ..DispatcherConfig::default()
    }
}

fn dispatcher(config: DispatcherConfig) -> Dispatcher {
    Dispatcher::builder(ReqwestSink::factory())
        .config(config)
        .build()
        .expect("dispatcher")
}

/// Poll history until `count` outcomes are recorded.
async fn wait_for_history(dispatcher: &Dispatcher, count: usize) -> Vec<ExecutionHistoryEntry> {
    let history = dispatcher.history();
    for _ in 0..600 {
        let entries = history.entries().await;
        if entries.len() >= count {
            return entries;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {count} history entries");
}

#[tokio::test]
async fn unreachable_target_fails_after_retry_budget() {
    let dispatcher = dispatcher(fast_config(2));
    let ack = dispatcher
        .submit(TaskSubmission::new(HttpMethod::Post, "http://example.invalid/hook"))
        .await
        .unwrap();
    dispatcher.start().await.expect("start");

    let entries = wait_for_history(&dispatcher, 1).await;
    dispatcher.stop().await;

    let entry = &entries[0];
    assert_eq!(entry.task_name, ack.name);
    assert_eq!(entry.status, ExecutionStatus::Failed);
    assert_eq!(entry.attempt_count, 3);
    assert_eq!(entry.status_code, 0);
    assert!(entry.error.is_some());
    assert!(dispatcher.list_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn reachable_target_succeeds_on_first_attempt() {
    let (url, received) = start_target(0).await;
    let dispatcher = dispatcher(fast_config(3));
    dispatcher
        .submit(
            TaskSubmission::new(HttpMethod::Post, url)
                .named("doc-7")
                .with_body(serde_json::json!({ "doc": 7 })),
        )
        .await
        .unwrap();
    dispatcher.start().await.expect("start");

    let entries = wait_for_history(&dispatcher, 1).await;
    dispatcher.stop().await;

    let entry = &entries[0];
    assert_eq!(entry.task_name, "doc-7");
    assert!(entry.is_success());
    assert_eq!(entry.status_code, 200);
    assert_eq!(entry.attempt_count, 1);
    assert_eq!(entry.response_body, "ok");
    assert!(dispatcher.list_tasks().await.unwrap().is_empty());

    let received = received.lock().unwrap();
    assert_eq!(received.calls, 1);
    assert_eq!(received.content_type.as_deref(), Some("application/json"));
    assert_eq!(received.body, r#"{"doc":7}"#);
    assert!(received.authorization.is_none());
}

#[tokio::test]
async fn transient_errors_are_retried_until_success() {
    let (url, received) = start_target(2).await;
    let dispatcher = dispatcher(fast_config(3));
    dispatcher
        .submit(TaskSubmission::new(HttpMethod::Post, url))
        .await
        .unwrap();
    dispatcher.start().await.expect("start");

    let entries = wait_for_history(&dispatcher, 1).await;
    dispatcher.stop().await;

    assert!(entries[0].is_success());
    assert_eq!(entries[0].attempt_count, 3);
    assert_eq!(received.lock().unwrap().calls, 3);
    assert_eq!(dispatcher.status().await.unwrap().completed_count, 1);
}

#[tokio::test]
async fn identity_token_is_sent_as_bearer() {
    let (url, received) = start_target(0).await;
    let dispatcher = Dispatcher::builder(ReqwestSink::factory())
        .config(fast_config(0))
        .token_provider(Arc::new(StaticTokenProvider::new("id-token-123")))
        .build()
        .expect("dispatcher");
    dispatcher
        .submit(
            TaskSubmission::new(HttpMethod::Post, url)
                .with_identity("worker@demo.iam.gserviceaccount.com")
                .with_body(serde_json::json!("raw text"))
                .with_header("content-type", "text/plain"),
        )
        .await
        .unwrap();
    dispatcher.start().await.expect("start");

    wait_for_history(&dispatcher, 1).await;
    dispatcher.stop().await;

    let received = received.lock().unwrap();
    assert_eq!(received.authorization.as_deref(), Some("Bearer id-token-123"));
    assert_eq!(received.content_type.as_deref(), Some("text/plain"));
    assert_eq!(received.body, "raw text");
}
