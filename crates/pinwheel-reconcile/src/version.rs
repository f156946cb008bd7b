//! Version creator: the declarative strategy.
//!
//! Mints an immutable image record from the deployment's template and moves
//! the deployment's version pointer to it.

use std::sync::Arc;
use std::time::Duration;

use pinwheel_core::PackagePublishedEvent;
use pinwheel_core::types::{DeploymentRecord, ImageFields, ImageRecord, ImageRef};
use tracing::{info, warn};

use crate::collaborators::{DeploymentStore, ImageStore, store_call};
use crate::error::{ReconcileError, ReconcileResult};
use crate::outcome::{Outcome, SkipReason};
use crate::resolver::resolve;

const DIGEST_PREFIX: &str = "sha256:";

#[derive(Clone)]
pub struct VersionCreator {
    deployments: Arc<dyn DeploymentStore>,
    images: Arc<dyn ImageStore>,
    timeout: Duration,
    update_attempts: u32,
}

impl VersionCreator {
    pub fn new(
        deployments: Arc<dyn DeploymentStore>,
        images: Arc<dyn ImageStore>,
        timeout: Duration,
        update_attempts: u32,
    ) -> Self {
        Self {
            deployments,
            images,
            timeout,
            update_attempts: update_attempts.max(1),
        }
    }

    pub async fn create_version(
        &self,
        event: &PackagePublishedEvent,
        deployment: &DeploymentRecord,
    ) -> ReconcileResult<Outcome> {
        let Some(template_id) = deployment.template.as_deref() else {
            info!(deployment = %deployment.id, "deployment has no template");
            return Ok(Outcome::Skipped(SkipReason::NoTemplate));
        };
        let template = store_call(
            "resolve_template",
            self.timeout,
            self.images.resolve_template(template_id),
        )
        .await?;
        let Some(template) = template else {
            info!(deployment = %deployment.id, template = template_id, "template not found");
            return Ok(Outcome::Skipped(SkipReason::NoTemplate));
        };

        let fields = versioned_fields(&template, event)?;
        let image = store_call("create_image", self.timeout, self.images.create(&fields)).await?;
        let version = deployment.version + 1;

        self.attach(deployment, &image, version).await?;

        info!(
            deployment = %deployment.id,
            image_id = %image.id,
            image = %image.fields.image,
            version,
            "image version created"
        );
        Ok(Outcome::VersionCreated(ImageRef {
            id: image.id,
            image: image.fields.image,
            version,
        }))
    }

    /// Point the deployment at `image`, retrying the update only.
    async fn attach(
        &self,
        deployment: &DeploymentRecord,
        image: &ImageRecord,
        version: u64,
    ) -> ReconcileResult<()> {
        let mut attempt = 1;
        loop {
            let result = store_call(
                "update_version",
                self.timeout,
                self.deployments
                    .update_version(&deployment.id, &image.id, version),
            )
            .await;
            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.update_attempts => {
                    warn!(
                        deployment = %deployment.id,
                        image_id = %image.id,
                        attempt,
                        error = %e,
                        "version update failed, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        deployment = %deployment.id,
                        orphaned_image = %image.id,
                        version,
                        error = %e,
                        "version update failed, image record left unreferenced"
                    );
                    return Err(e);
                }
            }
        }
    }
}

/// Template fields with identity and location replaced by the event's.
fn versioned_fields(
    template: &ImageRecord,
    event: &PackagePublishedEvent,
) -> Result<ImageFields, ReconcileError> {
    let mut fields = template.fields.clone();
    // A digest-bearing version already carries the prefix; keep it single.
    let bare = event
        .version
        .strip_prefix(DIGEST_PREFIX)
        .unwrap_or(&event.version);
    fields.name = event.name.clone();
    fields.namespace = event.namespace.clone();
    fields.tag = event.version.clone();
    fields.digest = format!("{DIGEST_PREFIX}{bare}");
    fields.image = resolve(event)?;
    fields.registry = event.registry.clone();
    fields.repository = event.repository.clone();
    Ok(fields)
}
