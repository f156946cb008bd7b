//! Shared domain types used across Pinwheel crates.
//!
//! Deployment and image records are persisted by `pinwheel-state`; cluster
//! resources are the live workloads the reconciler reads and patches.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a deployment record.
pub type DeploymentId = String;

/// Unique identifier for an image record (templates included).
pub type ImageId = String;

/// Cluster name used when a deployment record does not name one.
pub const DEFAULT_CLUSTER: &str = "default";

// ── Identity ──────────────────────────────────────────────────────

/// The `(name, namespace, branch)` triple that joins publish events to
/// deployment records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub namespace: String,
    pub branch: String,
}

impl Identity {
    pub fn new(name: &str, namespace: &str, branch: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            branch: branch.to_string(),
        }
    }

    /// Build the composite key for the identity index.
    pub fn table_key(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.name, self.branch)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.namespace, self.name, self.branch)
    }
}

// ── Deployment ────────────────────────────────────────────────────

/// A tracked mapping from a package identity to a cluster workload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentRecord {
    /// Assigned by the store when empty.
    #[serde(default)]
    pub id: DeploymentId,
    pub name: String,
    pub namespace: String,
    pub branch: String,
    /// Target cluster identifier.
    #[serde(default = "default_cluster")]
    pub cluster: String,
    /// `true` patches the live resource directly, `false` mints image versions.
    #[serde(default)]
    pub patch: bool,
    /// Current image record.
    #[serde(default)]
    pub image: Option<ImageId>,
    /// Image template used by the version-create strategy.
    #[serde(default)]
    pub template: Option<ImageId>,
    /// Registry location of the tracked package.
    #[serde(flatten)]
    pub source: PackageSource,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub status: DeploymentStatus,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

/// Descriptive package location carried on a deployment record. The
/// reconciler never reads it; it is there for operators and clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackageSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Id of the workload object in the target cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload: Option<String>,
}

fn default_cluster() -> String {
    DEFAULT_CLUSTER.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    #[default]
    Active,
    Inactive,
}

impl DeploymentRecord {
    pub fn identity(&self) -> Identity {
        Identity::new(&self.name, &self.namespace, &self.branch)
    }

    pub fn is_active(&self) -> bool {
        self.status == DeploymentStatus::Active
    }

    /// Reference to the live resource this record tracks.
    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            cluster: self.cluster.clone(),
        }
    }
}

// ── Images ────────────────────────────────────────────────────────

/// Image record fields without an identifier.
///
/// Everything a template carries beyond the location fields lands in
/// `attributes` and is copied verbatim into new versions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ImageFields {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub registry: String,
    #[serde(default)]
    pub repository: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// A persisted image record. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub id: ImageId,
    #[serde(flatten)]
    pub fields: ImageFields,
}

/// Reference to a freshly minted image version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: ImageId,
    pub image: String,
    /// Deployment version the image was attached at.
    pub version: u64,
}

// ── Cluster resources ─────────────────────────────────────────────

/// Address of a live resource in a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub name: String,
    pub namespace: String,
    pub cluster: String,
}

impl ResourceRef {
    /// Build the composite key for the resources table.
    pub fn table_key(&self) -> String {
        format!("{}/{}/{}", self.cluster, self.namespace, self.name)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.cluster, self.namespace, self.name)
    }
}

/// One container of a live deployment's pod template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Container {
    pub name: String,
    pub image: String,
    /// Every other container spec field, preserved untouched by patches.
    #[serde(flatten)]
    pub spec: BTreeMap<String, serde_json::Value>,
}

/// A live deployment as seen by cluster control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterResource {
    pub name: String,
    pub namespace: String,
    #[serde(default = "default_cluster")]
    pub cluster: String,
    pub containers: Vec<Container>,
}

impl ClusterResource {
    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            cluster: self.cluster.clone(),
        }
    }

    /// The container whose image the reconciler manages.
    pub fn primary_container(&self) -> Option<&Container> {
        self.containers.first()
    }
}

/// Minimal patch replacing the primary container of a resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainerPatch {
    pub container: Container,
}

impl ContainerPatch {
    /// Copy `container` with only its image replaced.
    pub fn with_image(container: &Container, image: &str) -> Self {
        let mut container = container.clone();
        container.image = image.to_string();
        Self { container }
    }

    /// Render as a merge patch against a deployment's pod template.
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "spec": {
                "template": {
                    "spec": {
                        "containers": [self.container]
                    }
                }
            }
        })
    }

    /// Apply to a resource, replacing its primary container.
    pub fn apply_to(&self, resource: &mut ClusterResource) {
        match resource.containers.first_mut() {
            Some(primary) => *primary = self.container.clone(),
            None => resource.containers.push(self.container.clone()),
        }
    }
}
