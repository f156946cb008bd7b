//! REST API handlers for records and metrics.
//!
//! Each handler reads/writes via `StateStore` and returns JSON responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use pinwheel_state::*;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
pub(crate) struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn state_error(e: &StateError) -> axum::response::Response {
    let status = match e {
        StateError::NotFound(_) => StatusCode::NOT_FOUND,
        StateError::Conflict(_) | StateError::StaleVersion { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status).into_response()
}

// ── Deployments ────────────────────────────────────────────────

/// GET /api/v1/deployments
pub async fn list_deployments(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_deployments() {
        Ok(deployments) => ApiResponse::ok(deployments).into_response(),
        Err(e) => state_error(&e),
    }
}

/// GET /api/v1/deployments/{id}
pub async fn get_deployment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_deployment(&id) {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => error_response("deployment not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => state_error(&e),
    }
}

/// POST /api/v1/deployments
///
/// Re-posting an existing id updates it but keeps its version pointer.
pub async fn create_deployment(
    State(state): State<ApiState>,
    Json(record): Json<DeploymentRecord>,
) -> impl IntoResponse {
    match state.store.put_deployment(&record) {
        Ok(stored) => (StatusCode::CREATED, ApiResponse::ok(stored)).into_response(),
        Err(e) => state_error(&e),
    }
}

/// DELETE /api/v1/deployments/{id}
pub async fn delete_deployment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_deployment(&id) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("deployment not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => state_error(&e),
    }
}

/// GET /api/v1/deployments/package/{namespace}/{name}/{branch}
pub async fn find_deployment(
    State(state): State<ApiState>,
    Path((namespace, name, branch)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let identity = Identity::new(&name, &namespace, &branch);
    match state.store.find_active_deployment(&identity) {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => error_response(
            &format!("no active deployment for {identity}"),
            StatusCode::NOT_FOUND,
        )
        .into_response(),
        Err(e) => state_error(&e),
    }
}

// ── Images ─────────────────────────────────────────────────────

/// Image create body. Templates are posted with an explicit `id`.
#[derive(Deserialize)]
pub struct ImageUpload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: ImageFields,
}

/// GET /api/v1/images
pub async fn list_images(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_images() {
        Ok(images) => ApiResponse::ok(images).into_response(),
        Err(e) => state_error(&e),
    }
}

/// GET /api/v1/images/{id}
pub async fn get_image(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_image(&id) {
        Ok(Some(image)) => ApiResponse::ok(image).into_response(),
        Ok(None) => error_response("image not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => state_error(&e),
    }
}

/// POST /api/v1/images
pub async fn create_image(
    State(state): State<ApiState>,
    Json(upload): Json<ImageUpload>,
) -> impl IntoResponse {
    let stored = match upload.id.filter(|id| !id.is_empty()) {
        Some(id) => {
            let record = ImageRecord {
                id,
                fields: upload.fields,
            };
            state.store.put_image(&record).map(|()| record)
        }
        None => state.store.create_image(&upload.fields),
    };
    match stored {
        Ok(record) => (StatusCode::CREATED, ApiResponse::ok(record)).into_response(),
        Err(e) => state_error(&e),
    }
}

// ── Resources ──────────────────────────────────────────────────

fn resource_ref(cluster: String, namespace: String, name: String) -> ResourceRef {
    ResourceRef {
        name,
        namespace,
        cluster,
    }
}

/// GET /api/v1/resources/{cluster}/{namespace}/{name}
pub async fn get_resource(
    State(state): State<ApiState>,
    Path((cluster, namespace, name)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let target = resource_ref(cluster, namespace, name);
    match state.store.get_resource(&target) {
        Ok(Some(resource)) => ApiResponse::ok(resource).into_response(),
        Ok(None) => error_response("resource not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => state_error(&e),
    }
}

/// PUT /api/v1/resources/{cluster}/{namespace}/{name}
///
/// The path is authoritative for the resource address.
pub async fn put_resource(
    State(state): State<ApiState>,
    Path((cluster, namespace, name)): Path<(String, String, String)>,
    Json(mut resource): Json<ClusterResource>,
) -> impl IntoResponse {
    resource.cluster = cluster;
    resource.namespace = namespace;
    resource.name = name;
    match state.store.put_resource(&resource) {
        Ok(()) => ApiResponse::ok(resource).into_response(),
        Err(e) => state_error(&e),
    }
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let samples = state.engine.metrics().snapshot().await;
    let body = pinwheel_metrics::render_prometheus(&samples);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
