//! REST API handlers for publish events and gate flags.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use pinwheel_core::PublishNotice;
use pinwheel_reconcile::{Delivery, GateConfig, ReconcileError};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::ApiState;
use crate::handlers::{ApiResponse, error_response};

fn reconcile_error(e: &ReconcileError) -> axum::response::Response {
    let status = match e {
        ReconcileError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
        ReconcileError::MalformedReference { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ReconcileError::StoreUnavailable { .. } | ReconcileError::ClusterUnavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    error_response(&e.to_string(), status).into_response()
}

/// POST /api/v1/cicd/publish
///
/// Reconciles the notice before responding. The caller has already filtered
/// by branch, so no branch guard applies.
pub async fn publish(
    State(state): State<ApiState>,
    Json(notice): Json<PublishNotice>,
) -> impl IntoResponse {
    match state.engine.handle_notice(notice, Delivery::Direct).await {
        Ok(outcome) => ApiResponse::ok(outcome).into_response(),
        Err(e) => reconcile_error(&e),
    }
}

/// POST /api/v1/cicd/events
///
/// Queues a raw bus notice for the worker and returns immediately.
pub async fn enqueue_event(
    State(state): State<ApiState>,
    Json(notice): Json<PublishNotice>,
) -> impl IntoResponse {
    let name = notice.name.clone();
    match state.bus.try_send(notice) {
        Ok(()) => {
            debug!(package = %name, "publish notice queued");
            (StatusCode::ACCEPTED, ApiResponse::ok("queued")).into_response()
        }
        Err(TrySendError::Full(_)) => {
            warn!(package = %name, "event bus full, notice refused");
            error_response("event bus is full", StatusCode::SERVICE_UNAVAILABLE).into_response()
        }
        Err(TrySendError::Closed(_)) => {
            error_response("event bus is closed", StatusCode::SERVICE_UNAVAILABLE).into_response()
        }
    }
}

/// GET /api/v1/cicd/config
pub async fn get_config(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.gate.current())
}

/// PUT /api/v1/cicd/config
pub async fn put_config(
    State(state): State<ApiState>,
    Json(gate): Json<GateConfig>,
) -> impl IntoResponse {
    match state.gate.set(gate) {
        Ok(()) => ApiResponse::ok(gate).into_response(),
        Err(e) => {
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}
