//! Deployment lookup by identity triple.

use std::sync::Arc;
use std::time::Duration;

use pinwheel_core::types::{DeploymentRecord, Identity};
use tracing::debug;

use crate::collaborators::{DeploymentStore, store_call};
use crate::error::ReconcileResult;

/// Finds the active deployment record for a package identity.
///
/// Most publish events have no tracked deployment, so `None` is the common
/// case and is only traced at debug level.
#[derive(Clone)]
pub struct DeploymentLookup {
    store: Arc<dyn DeploymentStore>,
    timeout: Duration,
}

impl DeploymentLookup {
    pub fn new(store: Arc<dyn DeploymentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn find_by_identity(
        &self,
        identity: &Identity,
    ) -> ReconcileResult<Option<DeploymentRecord>> {
        let found = store_call(
            "find_by_identity",
            self.timeout,
            self.store.find_by_identity(identity),
        )
        .await?
        // Records for another identity, or inactive ones, are never acted on.
        .filter(|record| record.identity() == *identity && record.is_active());

        match &found {
            Some(record) => debug!(%identity, deployment = %record.id, "deployment found"),
            None => debug!(%identity, "no tracked deployment"),
        }
        Ok(found)
    }
}
