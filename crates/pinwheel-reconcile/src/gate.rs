//! Gate flags: process-wide switches for reconciliation.
//!
//! The flags travel through a `tokio::sync::watch` channel. The admin path
//! holds a [`GateHandle`]; the engine holds a [`GateReader`] and takes one
//! snapshot at the start of every event.

use std::sync::Arc;

use pinwheel_core::config::CicdConfig;
use pinwheel_state::{StateResult, StateStore};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// Settings key for the master switch.
pub const ENABLED_KEY: &str = "cicd.enabled";
/// Settings key for direct patching.
pub const DIRTY_PATCH_KEY: &str = "cicd.dirtyPatch";

/// A point-in-time copy of the gate flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Master switch. When off, every event is skipped before any lookup.
    pub enabled: bool,
    /// Permits mutating live resources for `patch = true` deployments.
    pub dirty_patch: bool,
}

impl From<&CicdConfig> for GateConfig {
    fn from(cfg: &CicdConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            dirty_patch: cfg.dirty_patch,
        }
    }
}

impl GateConfig {
    /// Overlay flags persisted in the store on top of `self`.
    pub fn overlay_persisted(self, store: &StateStore) -> StateResult<Self> {
        Ok(Self {
            enabled: store.get_setting(ENABLED_KEY)?.unwrap_or(self.enabled),
            dirty_patch: store.get_setting(DIRTY_PATCH_KEY)?.unwrap_or(self.dirty_patch),
        })
    }
}

/// Writer side, held by the administrative path.
#[derive(Clone)]
pub struct GateHandle {
    tx: Arc<watch::Sender<GateConfig>>,
    store: Option<StateStore>,
}

/// Reader side, held by the engine.
#[derive(Clone)]
pub struct GateReader {
    rx: watch::Receiver<GateConfig>,
}

impl GateHandle {
    /// Create a gate channel seeded with `initial`.
    pub fn channel(initial: GateConfig) -> (GateHandle, GateReader) {
        let (tx, rx) = watch::channel(initial);
        (
            GateHandle {
                tx: Arc::new(tx),
                store: None,
            },
            GateReader { rx },
        )
    }

    /// Persist every update to `store` before publishing it.
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn current(&self) -> GateConfig {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> GateReader {
        GateReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Replace the flags. Readers see the new value on their next snapshot.
    pub fn set(&self, gate: GateConfig) -> StateResult<()> {
        if let Some(store) = &self.store {
            store.put_setting(ENABLED_KEY, &gate.enabled)?;
            store.put_setting(DIRTY_PATCH_KEY, &gate.dirty_patch)?;
        }
        let previous = self.tx.send_replace(gate);
        info!(
            enabled = gate.enabled,
            dirty_patch = gate.dirty_patch,
            was_enabled = previous.enabled,
            was_dirty_patch = previous.dirty_patch,
            "gate flags updated"
        );
        Ok(())
    }
}

impl GateReader {
    /// The latest flags. Never cached across events.
    pub fn snapshot(&self) -> GateConfig {
        *self.rx.borrow()
    }
}
