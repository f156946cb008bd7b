//! Standalone end-to-end tests.
//!
//! Drives the full router against an in-memory state store: records are
//! created over REST, publish notices go through the engine, and results
//! are read back over REST.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use pinwheel_api::{ApiState, build_router};
use pinwheel_core::PublishNotice;
use pinwheel_core::config::ReconcileConfig;
use pinwheel_reconcile::{GateConfig, GateHandle, ReconciliationEngine};
use pinwheel_state::StateStore;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

fn router_with(store: StateStore, gate: GateConfig) -> (Router, mpsc::Receiver<PublishNotice>) {
    let (handle, reader) = GateHandle::channel(gate);
    let engine = ReconciliationEngine::standalone(store.clone(), reader, &ReconcileConfig::default());
    let (tx, rx) = mpsc::channel(16);
    let router = build_router(ApiState {
        store: store.clone(),
        engine: Arc::new(engine),
        gate: handle.with_store(store),
        bus: tx,
    });
    (router, rx)
}

fn test_router() -> Router {
    router_with(StateStore::open_in_memory().unwrap(), GateConfig::default()).0
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn enable(router: &Router, dirty_patch: bool) {
    let (status, _) = send(
        router,
        json_request(
            "PUT",
            "/api/v1/cicd/config",
            json!({ "enabled": true, "dirty_patch": dirty_patch }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

fn publish_body(version: &str) -> Value {
    json!({
        "name": "api",
        "namespace": "paas-shack",
        "branch": "main",
        "version": version,
        "sha256": "abc123",
        "url": "ghcr.io/paas-shack/api:main",
        "registry": "ghcr.io",
    })
}

#[tokio::test]
async fn standalone_api_list_deployments_empty() {
    let router = test_router();
    let (status, body) = send(&router, get("/api/v1/deployments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn publish_while_disabled_is_skipped() {
    let router = test_router();
    let (status, body) = send(
        &router,
        json_request("POST", "/api/v1/cicd/publish", publish_body("1.0.0")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "skipped");
    assert_eq!(body["data"]["detail"], "disabled");
}

#[tokio::test]
async fn publish_creates_versions_from_template() {
    let router = test_router();
    enable(&router, false).await;

    let (status, _) = send(
        &router,
        json_request(
            "POST",
            "/api/v1/images",
            json!({ "id": "tpl1", "name": "base", "namespace": "paas-shack", "pullPolicy": "IfNotPresent" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, created) = send(
        &router,
        json_request(
            "POST",
            "/api/v1/deployments",
            json!({
                "name": "api",
                "namespace": "paas-shack",
                "branch": "main",
                "template": "tpl1",
                "version": 3,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &router,
        json_request("POST", "/api/v1/cicd/publish", publish_body("1.0.0")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "version_created");
    assert_eq!(body["data"]["detail"]["version"], 4);
    assert_eq!(body["data"]["detail"]["image"], "ghcr.io/paas-shack/api@sha256:abc123");
    let image_id = body["data"]["detail"]["id"].as_str().unwrap().to_string();

    let (_, deployment) = send(&router, get(&format!("/api/v1/deployments/{id}"))).await;
    assert_eq!(deployment["data"]["version"], 4);
    assert_eq!(deployment["data"]["image"], image_id.as_str());

    let (_, image) = send(&router, get(&format!("/api/v1/images/{image_id}"))).await;
    assert_eq!(image["data"]["tag"], "1.0.0");
    assert_eq!(image["data"]["digest"], "sha256:1.0.0");
    assert_eq!(image["data"]["pullPolicy"], "IfNotPresent");

    // A second publish advances again.
    let (_, body) = send(
        &router,
        json_request("POST", "/api/v1/cicd/publish", publish_body("1.0.1")),
    )
    .await;
    assert_eq!(body["data"]["detail"]["version"], 5);
}

#[tokio::test]
async fn publish_patches_live_resource_once() {
    let router = test_router();
    enable(&router, true).await;

    send(
        &router,
        json_request(
            "POST",
            "/api/v1/deployments",
            json!({ "name": "api", "namespace": "paas-shack", "branch": "main", "cluster": "c1", "patch": true }),
        ),
    )
    .await;
    let (status, _) = send(
        &router,
        json_request(
            "PUT",
            "/api/v1/resources/c1/paas-shack/api",
            json!({
                "name": "api",
                "namespace": "paas-shack",
                "containers": [
                    { "name": "app", "image": "ghcr.io/paas-shack/api:main", "imagePullPolicy": "Always" },
                    { "name": "proxy", "image": "envoy:1.30" }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, first) = send(
        &router,
        json_request("POST", "/api/v1/cicd/publish", publish_body("1.0.0")),
    )
    .await;
    let (_, second) = send(
        &router,
        json_request("POST", "/api/v1/cicd/publish", publish_body("1.0.0")),
    )
    .await;
    assert_eq!(first["data"]["outcome"], "patched");
    assert_eq!(second["data"]["outcome"], "skipped");
    assert_eq!(second["data"]["detail"], "image-unchanged");

    let (_, resource) = send(&router, get("/api/v1/resources/c1/paas-shack/api")).await;
    let containers = &resource["data"]["containers"];
    assert_eq!(containers[0]["image"], "ghcr.io/paas-shack/api@sha256:abc123");
    assert_eq!(containers[0]["imagePullPolicy"], "Always");
    assert_eq!(containers[1]["image"], "envoy:1.30");

    let resp = router.clone().oneshot(get("/metrics")).await.unwrap();
    let text = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains(r#"pinwheel_reconcile_outcomes_total{outcome="patched",reason=""} 1"#));
    assert!(text.contains(r#"pinwheel_reconcile_outcomes_total{outcome="skipped",reason="image-unchanged"} 1"#));
}

#[tokio::test]
async fn package_lookup_returns_404_when_untracked() {
    let router = test_router();
    let (status, body) = send(
        &router,
        get("/api/v1/deployments/package/paas-shack/api/main"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn invalid_notice_is_bad_request() {
    let router = test_router();
    let (status, body) = send(
        &router,
        json_request("POST", "/api/v1/cicd/publish", json!({ "name": "api", "branch": "main" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("namespace"));
}

#[tokio::test]
async fn bus_events_are_accepted_and_queued() {
    let (router, mut rx) = router_with(StateStore::open_in_memory().unwrap(), GateConfig::default());
    let (status, _) = send(
        &router,
        json_request("POST", "/api/v1/cicd/events", publish_body("1.0.0")),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let queued = rx.recv().await.unwrap();
    assert_eq!(queued.namespace, "paas-shack");
}

#[tokio::test]
async fn gate_flags_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pinwheel.redb");

    {
        let store = StateStore::open(&path).unwrap();
        let (router, _rx) = router_with(store, GateConfig::default());
        enable(&router, true).await;
    }

    let store = StateStore::open(&path).unwrap();
    let gate = GateConfig::default().overlay_persisted(&store).unwrap();
    assert_eq!(
        gate,
        GateConfig {
            enabled: true,
            dirty_patch: true
        }
    );
}
