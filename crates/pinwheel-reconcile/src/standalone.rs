//! Collaborator implementations over the embedded [`StateStore`].
//!
//! In standalone mode the same redb file holds deployment records, image
//! records, and the cluster resources the patcher rewrites.

use anyhow::Context;
use async_trait::async_trait;
use pinwheel_core::types::*;
use pinwheel_state::{StateResult, StateStore};
use std::sync::Arc;

use crate::collaborators::{ClusterControl, Collaborators, DeploymentStore, ImageStore};

impl Collaborators {
    /// Back every collaborator with one state store.
    pub fn standalone(store: StateStore) -> Self {
        let store = Arc::new(store);
        Self {
            deployments: store.clone(),
            images: store.clone(),
            cluster: store,
        }
    }
}

/// Run a redb transaction on the blocking pool so the engine's call
/// timeouts can fire while it is in progress.
async fn blocking<R, F>(store: &StateStore, f: F) -> anyhow::Result<R>
where
    F: FnOnce(&StateStore) -> StateResult<R> + Send + 'static,
    R: Send + 'static,
{
    let store = store.clone();
    let result = tokio::task::spawn_blocking(move || f(&store))
        .await
        .context("state store task panicked")?;
    Ok(result?)
}

#[async_trait]
impl DeploymentStore for StateStore {
    async fn find_by_identity(
        &self,
        identity: &Identity,
    ) -> anyhow::Result<Option<DeploymentRecord>> {
        let identity = identity.clone();
        blocking(self, move |store| store.find_active_deployment(&identity)).await
    }

    async fn update_version(&self, id: &str, image_id: &str, version: u64) -> anyhow::Result<()> {
        let (id, image_id) = (id.to_string(), image_id.to_string());
        blocking(self, move |store| {
            store.update_deployment_version(&id, &image_id, version)
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ImageStore for StateStore {
    async fn resolve_template(&self, id: &str) -> anyhow::Result<Option<ImageRecord>> {
        let id = id.to_string();
        blocking(self, move |store| store.get_image(&id)).await
    }

    async fn create(&self, fields: &ImageFields) -> anyhow::Result<ImageRecord> {
        let fields = fields.clone();
        blocking(self, move |store| store.create_image(&fields)).await
    }
}

#[async_trait]
impl ClusterControl for StateStore {
    async fn read_resource(&self, target: &ResourceRef) -> anyhow::Result<Option<ClusterResource>> {
        let target = target.clone();
        blocking(self, move |store| store.get_resource(&target)).await
    }

    async fn patch_resource(&self, target: &ResourceRef, patch: &ContainerPatch) -> anyhow::Result<()> {
        let (target, patch) = (target.clone(), patch.clone());
        blocking(self, move |store| {
            StateStore::patch_resource(store, &target, &patch)
        })
        .await
    }
}
