//! pinwheel-api: REST API for Pinwheel.
//!
//! Provides axum route handlers for publish events, gate flags, and the
//! deployment, image, and resource records the engine works against.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/cicd/publish` | Reconcile a publish notice now |
//! | POST | `/api/v1/cicd/events` | Queue a raw bus notice |
//! | GET/PUT | `/api/v1/cicd/config` | Read or replace the gate flags |
//! | GET/POST | `/api/v1/deployments` | List or create deployment records |
//! | GET/DELETE | `/api/v1/deployments/{id}` | Get or delete a record |
//! | GET | `/api/v1/deployments/package/{namespace}/{name}/{branch}` | Active record for a package |
//! | GET/POST | `/api/v1/images` | List or create image records |
//! | GET | `/api/v1/images/{id}` | Get an image record |
//! | GET/PUT | `/api/v1/resources/{cluster}/{namespace}/{name}` | Standalone cluster resources |
//! | GET | `/metrics` | Prometheus exposition |

pub mod cicd_handlers;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use pinwheel_core::PublishNotice;
use pinwheel_reconcile::{GateHandle, ReconciliationEngine};
use pinwheel_state::StateStore;
use tokio::sync::mpsc;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub engine: Arc<ReconciliationEngine>,
    pub gate: GateHandle,
    /// Inbound queue drained by the bus worker.
    pub bus: mpsc::Sender<PublishNotice>,
}

/// Build the complete API router (REST + metrics).
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/cicd/publish", post(cicd_handlers::publish))
        .route("/cicd/events", post(cicd_handlers::enqueue_event))
        .route(
            "/cicd/config",
            get(cicd_handlers::get_config).put(cicd_handlers::put_config),
        )
        .route(
            "/deployments",
            get(handlers::list_deployments).post(handlers::create_deployment),
        )
        .route(
            "/deployments/{id}",
            get(handlers::get_deployment).delete(handlers::delete_deployment),
        )
        .route(
            "/deployments/package/{namespace}/{name}/{branch}",
            get(handlers::find_deployment),
        )
        .route("/images", get(handlers::list_images).post(handlers::create_image))
        .route("/images/{id}", get(handlers::get_image))
        .route(
            "/resources/{cluster}/{namespace}/{name}",
            get(handlers::get_resource).put(handlers::put_resource),
        )
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
}
