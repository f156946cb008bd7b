//! pinwheel.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinwheelConfig {
    #[serde(default)]
    pub cicd: CicdConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub bus: BusConfig,
}

/// Gate flags. Both start off; reconciliation is opt-in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CicdConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub dirty_patch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Upper bound on a single store call, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Upper bound on a single cluster-control call, in milliseconds.
    #[serde(default = "default_cluster_timeout_ms")]
    pub cluster_timeout_ms: u64,
    /// Total attempts at advancing a deployment after its image was created.
    #[serde(default = "default_update_attempts")]
    pub update_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Notices buffered before producers are pushed back.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
    /// Notices reconciled concurrently.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

fn default_cluster_timeout_ms() -> u64 {
    10_000
}

fn default_update_attempts() -> u32 {
    2
}

fn default_bus_capacity() -> usize {
    1024
}

fn default_max_in_flight() -> usize {
    16
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: default_store_timeout_ms(),
            cluster_timeout_ms: default_cluster_timeout_ms(),
            update_attempts: default_update_attempts(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl PinwheelConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PinwheelConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
