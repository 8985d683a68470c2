//! App configuration client and provisioner token lookup against a stub
//! configuration service.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use courier_core::config::ProvisionerConfig;
use courier_core::impls::{EmulatedQueueAdmin, HttpAppConfigSource};
use courier_core::ports::{AppConfigSource, QueueAdmin, SystemClock};
use courier_core::routing::QueueProvisioner;

#[derive(Default)]
struct Hits(AtomicUsize);

async fn config_for(State(hits): State<Arc<Hits>>, Path(app_id): Path<String>) -> Response {
    hits.0.fetch_add(1, Ordering::SeqCst);
    match app_id.as_str() {
        "acme" => Json(json!({
            "name": "Acme Claims",
            "description": "claims intake",
            "config": {
                "accounting": { "business_unit": "claims", "solution_code": "intake" },
                "retention_days": 30
            }
        }))
        .into_response(),
        "team/acme" => Json(json!({ "name": "Team Acme" })).into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        "garbage" => (StatusCode::OK, "not json").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            StatusCode::NOT_FOUND.into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn start_stub() -> (String, Arc<Hits>) {
    let hits = Arc::new(Hits::default());
    let app = Router::new()
        .route("/configs/{app_id}", get(config_for))
        .with_state(Arc::clone(&hits));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    (format!("http://{addr}"), hits)
}

fn source(url: &str) -> HttpAppConfigSource {
    HttpAppConfigSource::new(format!("{url}/"), Duration::from_millis(500)).expect("client")
}

#[tokio::test]
async fn found_document_is_parsed() {
    let (url, _) = start_stub().await;
    let doc = source(&url).fetch("acme").await.unwrap().unwrap();

    assert_eq!(doc.name.as_deref(), Some("Acme Claims"));
    let accounting = doc.config.accounting.unwrap();
    assert_eq!(accounting.business_unit.as_deref(), Some("claims"));
    assert_eq!(accounting.solution_code.as_deref(), Some("intake"));
    assert_eq!(doc.config.extra["retention_days"], 30);
}

#[tokio::test]
async fn missing_app_is_none_and_failures_are_errors() {
    let (url, _) = start_stub().await;
    let source = source(&url);

    assert!(source.fetch("nobody").await.unwrap().is_none());
    assert!(source.fetch("broken").await.is_err());
    assert!(source.fetch("garbage").await.is_err());
    assert!(source.fetch("slow").await.is_err());
}

#[tokio::test]
async fn app_ids_with_path_characters_stay_in_one_segment() {
    let (url, hits) = start_stub().await;
    let doc = source(&url).fetch("team/acme").await.unwrap().unwrap();

    assert_eq!(doc.name.as_deref(), Some("Team Acme"));
    assert_eq!(hits.0.load(Ordering::SeqCst), 1);
}

fn provisioner(url: &str, config_timeout: Duration) -> (QueueProvisioner, Arc<EmulatedQueueAdmin>) {
    let admin = Arc::new(EmulatedQueueAdmin::new());
    let source: Arc<dyn AppConfigSource> = Arc::new(
        HttpAppConfigSource::new(url, Duration::from_secs(5)).expect("client"),
    );
    let config = ProvisionerConfig {
        config_timeout,
        ..ProvisionerConfig::default()
    };
    let provisioner = QueueProvisioner::new(
        Arc::clone(&admin) as Arc<dyn QueueAdmin>,
        Some(source),
        Arc::new(SystemClock),
        config,
        "demo",
        "us-central1",
    );
    (provisioner, admin)
}

#[tokio::test]
async fn provisioner_names_queues_from_app_config_and_caches_it() {
    let (url, hits) = start_stub().await;
    let (provisioner, admin) = provisioner(&url, Duration::from_secs(1));

    let result = provisioner
        .provision_templates(["${business_unit}-{solution_code}-extract"], "acme")
        .await
        .unwrap();
    assert_eq!(result.total_created, 3);
    assert!(admin.queue_exists("claims-intake-extract-high", "us-central1").await.unwrap());

    let again = provisioner
        .provision_templates(["{business_unit}-{solution_code}-extract"], "acme")
        .await
        .unwrap();
    assert_eq!(again.total_existing, 3);
    assert_eq!(hits.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_config_service_falls_back_without_failing() {
    let (url, hits) = start_stub().await;
    let (provisioner, _) = provisioner(&url, Duration::from_millis(100));

    let result = provisioner
        .provision_templates(["{app_id}-{business_unit}"], "slow")
        .await
        .unwrap();
    assert!(result.success());
    assert_eq!(result.queues[0].queue_name, "unknown-default");

    provisioner.token_set("slow").await;
    assert_eq!(hits.0.load(Ordering::SeqCst), 2);
}
