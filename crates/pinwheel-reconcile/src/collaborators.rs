//! Collaborator seams: the store and cluster-control interfaces the engine
//! consumes, plus the timeout wrappers every call goes through.
//!
//! Implementations report failures as `anyhow::Error`; the wrappers turn
//! them (and timeouts) into `StoreUnavailable` / `ClusterUnavailable`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pinwheel_core::config::ReconcileConfig;
use pinwheel_core::types::*;

use crate::error::{ReconcileError, ReconcileResult};

/// Deployment record store.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// The active record for `identity`, if any.
    async fn find_by_identity(&self, identity: &Identity)
    -> anyhow::Result<Option<DeploymentRecord>>;

    /// Point deployment `id` at `image_id` and set its version.
    async fn update_version(&self, id: &str, image_id: &str, version: u64) -> anyhow::Result<()>;
}

/// Image record store. Templates are ordinary image records.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn resolve_template(&self, id: &str) -> anyhow::Result<Option<ImageRecord>>;

    /// Persist `fields` under a fresh id.
    async fn create(&self, fields: &ImageFields) -> anyhow::Result<ImageRecord>;
}

/// Cluster control API.
#[async_trait]
pub trait ClusterControl: Send + Sync {
    async fn read_resource(&self, resource: &ResourceRef)
    -> anyhow::Result<Option<ClusterResource>>;

    async fn patch_resource(&self, resource: &ResourceRef, patch: &ContainerPatch)
    -> anyhow::Result<()>;
}

/// The full set of collaborators an engine is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub deployments: Arc<dyn DeploymentStore>,
    pub images: Arc<dyn ImageStore>,
    pub cluster: Arc<dyn ClusterControl>,
}

/// Upper bounds on single collaborator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub store: Duration,
    pub cluster: Duration,
}

impl From<&ReconcileConfig> for Timeouts {
    fn from(cfg: &ReconcileConfig) -> Self {
        Self {
            store: Duration::from_millis(cfg.store_timeout_ms),
            cluster: Duration::from_millis(cfg.cluster_timeout_ms),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from(&ReconcileConfig::default())
    }
}

/// Run a store call under `limit`.
pub(crate) async fn store_call<T>(
    op: &'static str,
    limit: Duration,
    call: impl Future<Output = anyhow::Result<T>>,
) -> ReconcileResult<T> {
    bounded(limit, call)
        .await
        .map_err(|reason| ReconcileError::StoreUnavailable { op, reason })
}

/// Run a cluster-control call under `limit`.
pub(crate) async fn cluster_call<T>(
    op: &'static str,
    limit: Duration,
    call: impl Future<Output = anyhow::Result<T>>,
) -> ReconcileResult<T> {
    bounded(limit, call)
        .await
        .map_err(|reason| ReconcileError::ClusterUnavailable { op, reason })
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, String> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(_) => Err(format!("timed out after {}ms", limit.as_millis())),
    }
}
