//! Per-identity serialization.
//!
//! Two publish events for the same `(name, namespace, branch)` would
//! otherwise race: both read the same deployment version, or both see a
//! stale live image and both patch. `IdentityLocks` hands out one async
//! mutex per identity; events for different identities never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use pinwheel_core::types::Identity;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

type Slot = Arc<tokio::sync::Mutex<()>>;
type Table = Arc<Mutex<HashMap<Identity, Slot>>>;

/// Keyed lock table. Cheap to clone; clones share the table.
#[derive(Clone, Default)]
pub struct IdentityLocks {
    table: Table,
}

/// Held for the duration of one event's handling.
pub struct IdentityGuard {
    table: Table,
    identity: Identity,
    slot: Slot,
    _held: OwnedMutexGuard<()>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `identity`.
    pub async fn acquire(&self, identity: &Identity) -> IdentityGuard {
        let slot = lock_table(&self.table)
            .entry(identity.clone())
            .or_default()
            .clone();
        let held = slot.clone().lock_owned().await;
        debug!(%identity, "identity lock acquired");
        IdentityGuard {
            table: self.table.clone(),
            identity: identity.clone(),
            slot,
            _held: held,
        }
    }

    /// Number of identities with a holder or waiter.
    pub fn len(&self) -> usize {
        lock_table(&self.table).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        let mut table = lock_table(&self.table);
        // One reference each from the table, this guard, and the held lock.
        // Anything more is a waiter that will reuse the slot.
        if Arc::strong_count(&self.slot) <= 3 {
            table.remove(&self.identity);
        }
    }
}

fn lock_table(table: &Table) -> MutexGuard<'_, HashMap<Identity, Slot>> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
