//! Live patcher: the direct-patch strategy.
//!
//! Rewrites the primary container image of a live resource in place. The
//! read-compare-patch sequence makes redelivery of the same publish event a
//! no-op: the second delivery finds the image already pinned.

use std::sync::Arc;
use std::time::Duration;

use pinwheel_core::PackagePublishedEvent;
use pinwheel_core::types::{ContainerPatch, DeploymentRecord};
use tracing::info;

use crate::collaborators::{ClusterControl, cluster_call};
use crate::error::ReconcileResult;
use crate::outcome::{Outcome, SkipReason};
use crate::resolver::resolve;

#[derive(Clone)]
pub struct LivePatcher {
    cluster: Arc<dyn ClusterControl>,
    timeout: Duration,
}

impl LivePatcher {
    pub fn new(cluster: Arc<dyn ClusterControl>, timeout: Duration) -> Self {
        Self { cluster, timeout }
    }

    /// Point the deployment's live resource at the event's pinned image.
    pub async fn patch(
        &self,
        event: &PackagePublishedEvent,
        deployment: &DeploymentRecord,
    ) -> ReconcileResult<Outcome> {
        let target = deployment.resource_ref();
        let resource = cluster_call(
            "read_resource",
            self.timeout,
            self.cluster.read_resource(&target),
        )
        .await?;

        let Some(primary) = resource.as_ref().and_then(|r| r.primary_container()) else {
            info!(
                resource = %target,
                deployment = %deployment.id,
                "live resource not found, record has drifted from cluster"
            );
            return Ok(Outcome::Skipped(SkipReason::NoResource));
        };

        let image = resolve(event)?;
        if primary.image == image {
            info!(resource = %target, %image, "image is already set");
            return Ok(Outcome::Skipped(SkipReason::ImageUnchanged));
        }

        let patch = ContainerPatch::with_image(primary, &image);
        info!(
            resource = %target,
            deployment = %deployment.id,
            from = %primary.image,
            to = %image,
            "patching deployment image"
        );
        cluster_call(
            "patch_resource",
            self.timeout,
            self.cluster.patch_resource(&target, &patch),
        )
        .await?;

        Ok(Outcome::Patched(target))
    }
}
