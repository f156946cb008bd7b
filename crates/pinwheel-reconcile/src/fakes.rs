//! In-memory collaborators for unit tests, with call counters and failure
//! injection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use pinwheel_core::PackagePublishedEvent;
use pinwheel_core::types::*;

use crate::collaborators::{ClusterControl, Collaborators, DeploymentStore, ImageStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub lookups: u32,
    pub reads: u32,
    pub patches: u32,
    pub templates: u32,
    pub creates: u32,
    pub updates: u32,
}

#[derive(Default)]
struct Inner {
    deployments: HashMap<DeploymentId, DeploymentRecord>,
    images: HashMap<ImageId, ImageRecord>,
    resources: HashMap<ResourceRef, ClusterResource>,
    calls: Calls,
    next_image: u32,
    failing_updates: u32,
    store_down: bool,
    cluster_down: bool,
    store_delay: Option<Duration>,
    cluster_delay: Option<Duration>,
}

#[derive(Default)]
pub struct FakeBackend {
    inner: Mutex<Inner>,
}

impl FakeBackend {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            deployments: self.clone(),
            images: self.clone(),
            cluster: self.clone(),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    pub fn add_deployment(&self, mut record: DeploymentRecord) -> DeploymentRecord {
        if record.id.is_empty() {
            record.id = format!("dep-{}", record.identity().table_key());
        }
        self.with(|i| i.deployments.insert(record.id.clone(), record.clone()));
        record
    }

    pub fn deployment(&self, id: &str) -> Option<DeploymentRecord> {
        self.with(|i| i.deployments.get(id).cloned())
    }

    pub fn add_template(&self, record: ImageRecord) {
        self.with(|i| i.images.insert(record.id.clone(), record));
    }

    pub fn image(&self, id: &str) -> Option<ImageRecord> {
        self.with(|i| i.images.get(id).cloned())
    }

    pub fn image_count(&self) -> usize {
        self.with(|i| i.images.len())
    }

    pub fn add_resource(&self, resource: ClusterResource) {
        self.with(|i| i.resources.insert(resource.resource_ref(), resource));
    }

    pub fn resource(&self, target: &ResourceRef) -> Option<ClusterResource> {
        self.with(|i| i.resources.get(target).cloned())
    }

    pub fn calls(&self) -> Calls {
        self.with(|i| i.calls)
    }

    /// Fail the next `n` version updates.
    pub fn fail_updates(&self, n: u32) {
        self.with(|i| i.failing_updates = n);
    }

    pub fn set_store_down(&self, down: bool) {
        self.with(|i| i.store_down = down);
    }

    pub fn set_cluster_down(&self, down: bool) {
        self.with(|i| i.cluster_down = down);
    }

    pub fn set_store_delay(&self, delay: Duration) {
        self.with(|i| i.store_delay = Some(delay));
    }

    pub fn set_cluster_delay(&self, delay: Duration) {
        self.with(|i| i.cluster_delay = Some(delay));
    }

    async fn store_gate(&self) -> anyhow::Result<()> {
        let (down, delay) = self.with(|i| (i.store_down, i.store_delay));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if down {
            bail!("store connection refused");
        }
        Ok(())
    }

    async fn cluster_gate(&self) -> anyhow::Result<()> {
        let (down, delay) = self.with(|i| (i.cluster_down, i.cluster_delay));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if down {
            bail!("cluster api unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl DeploymentStore for FakeBackend {
    async fn find_by_identity(
        &self,
        identity: &Identity,
    ) -> anyhow::Result<Option<DeploymentRecord>> {
        self.with(|i| i.calls.lookups += 1);
        self.store_gate().await?;
        Ok(self.with(|i| {
            i.deployments
                .values()
                .find(|d| d.identity() == *identity && d.is_active())
                .cloned()
        }))
    }

    async fn update_version(&self, id: &str, image_id: &str, version: u64) -> anyhow::Result<()> {
        self.with(|i| i.calls.updates += 1);
        self.store_gate().await?;
        self.with(|i| -> anyhow::Result<()> {
            if i.failing_updates > 0 {
                i.failing_updates -= 1;
                bail!("write conflict");
            }
            let record = i
                .deployments
                .get_mut(id)
                .ok_or_else(|| anyhow!("deployment {id} not found"))?;
            if version != record.version + 1 {
                bail!("stale version {version} for {id} at {}", record.version);
            }
            record.version = version;
            record.image = Some(image_id.to_string());
            Ok(())
        })
    }
}

#[async_trait]
impl ImageStore for FakeBackend {
    async fn resolve_template(&self, id: &str) -> anyhow::Result<Option<ImageRecord>> {
        self.with(|i| i.calls.templates += 1);
        self.store_gate().await?;
        Ok(self.image(id))
    }

    async fn create(&self, fields: &ImageFields) -> anyhow::Result<ImageRecord> {
        self.with(|i| i.calls.creates += 1);
        self.store_gate().await?;
        Ok(self.with(|i| {
            i.next_image += 1;
            let record = ImageRecord {
                id: format!("img-{}", i.next_image),
                fields: fields.clone(),
            };
            i.images.insert(record.id.clone(), record.clone());
            record
        }))
    }
}

#[async_trait]
impl ClusterControl for FakeBackend {
    async fn read_resource(&self, target: &ResourceRef) -> anyhow::Result<Option<ClusterResource>> {
        self.with(|i| i.calls.reads += 1);
        self.cluster_gate().await?;
        Ok(self.resource(target))
    }

    async fn patch_resource(&self, target: &ResourceRef, patch: &ContainerPatch) -> anyhow::Result<()> {
        self.with(|i| i.calls.patches += 1);
        self.cluster_gate().await?;
        self.with(|i| -> anyhow::Result<()> {
            let resource = i
                .resources
                .get_mut(target)
                .ok_or_else(|| anyhow!("resource {target} not found"))?;
            patch.apply_to(resource);
            Ok(())
        })
    }
}

// ── Fixtures ──────────────────────────────────────────────────────

pub fn event() -> PackagePublishedEvent {
    PackagePublishedEvent {
        name: "foo".to_string(),
        namespace: "ns".to_string(),
        branch: "main".to_string(),
        version: "1.2.0".to_string(),
        sha256: Some("abc123".to_string()),
        url: "ghcr.io/ns/foo:main".to_string(),
        repository: "ns/foo".to_string(),
        registry: "ghcr.io".to_string(),
    }
}

fn deployment(id: &str, cluster: &str, patch: bool) -> DeploymentRecord {
    DeploymentRecord {
        id: id.to_string(),
        name: "foo".to_string(),
        namespace: "ns".to_string(),
        branch: "main".to_string(),
        cluster: cluster.to_string(),
        patch,
        image: None,
        template: None,
        source: PackageSource::default(),
        version: 0,
        status: DeploymentStatus::Active,
        created_at: 0,
        updated_at: 0,
    }
}

pub fn patch_deployment(cluster: &str) -> DeploymentRecord {
    deployment("d-patch", cluster, true)
}

pub fn version_deployment(template: &str, version: u64) -> DeploymentRecord {
    let mut record = deployment("d-version", DEFAULT_CLUSTER, false);
    record.template = Some(template.to_string());
    record.version = version;
    record
}

pub fn resource(cluster: &str, image: &str) -> ClusterResource {
    let mut container = Container {
        name: "app".to_string(),
        image: image.to_string(),
        spec: Default::default(),
    };
    container
        .spec
        .insert("imagePullPolicy".to_string(), serde_json::json!("Always"));
    ClusterResource {
        name: "foo".to_string(),
        namespace: "ns".to_string(),
        cluster: cluster.to_string(),
        containers: vec![container],
    }
}

pub fn template(id: &str) -> ImageRecord {
    let mut fields = ImageFields {
        name: "template".to_string(),
        namespace: "ns".to_string(),
        tag: "latest".to_string(),
        registry: "docker.io".to_string(),
        ..Default::default()
    };
    fields
        .attributes
        .insert("pullPolicy".to_string(), serde_json::json!("IfNotPresent"));
    ImageRecord {
        id: id.to_string(),
        fields,
    }
}
