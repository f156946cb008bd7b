//! StateStore: redb-backed record persistence for Pinwheel.
//!
//! Provides typed CRUD operations over deployment records, image records,
//! standalone cluster resources, and settings. All values are JSON-serialized
//! into redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use pinwheel_core::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

fn encode<T: Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

/// Thread-safe record store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        txn.open_table(DEPLOYMENT_IDENTITIES).map_err(map_err!(Table))?;
        txn.open_table(IMAGES).map_err(map_err!(Table))?;
        txn.open_table(RESOURCES).map_err(map_err!(Table))?;
        txn.open_table(SETTINGS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Deployments ────────────────────────────────────────────────

    /// Insert or update a deployment record.
    ///
    /// An empty `id` is replaced with a fresh one. Active records are indexed
    /// by identity; a second active record for the same identity is rejected
    /// with `StateError::Conflict`. An existing record keeps its stored
    /// `version`, `image` and `created_at`: only
    /// [`update_deployment_version`](Self::update_deployment_version) moves
    /// the version pointer. Returns the stored record.
    pub fn put_deployment(&self, record: &DeploymentRecord) -> StateResult<DeploymentRecord> {
        let mut record = record.clone();
        let now = epoch_secs();
        if record.id.is_empty() {
            record.id = uuid::Uuid::new_v4().to_string();
        }

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let identity_key = {
            let mut deployments = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            let mut identities = txn
                .open_table(DEPLOYMENT_IDENTITIES)
                .map_err(map_err!(Table))?;

            let previous: Option<DeploymentRecord> = match deployments
                .get(record.id.as_str())
                .map_err(map_err!(Read))?
            {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            match &previous {
                Some(previous) => {
                    record.version = previous.version;
                    record.image = previous.image.clone();
                    record.created_at = previous.created_at;
                }
                None if record.created_at == 0 => record.created_at = now,
                None => {}
            }
            record.updated_at = now;

            let identity_key = record.identity().table_key();
            let indexed = identities
                .get(identity_key.as_str())
                .map_err(map_err!(Read))?
                .map(|guard| guard.value().to_string());
            if record.is_active() {
                if let Some(owner) = indexed.as_deref().filter(|owner| *owner != record.id) {
                    return Err(StateError::Conflict(format!(
                        "deployment {owner} is already active for {identity_key}"
                    )));
                }
            }

            // Drop the index entry left behind by a previous identity, unless
            // another record owns it.
            if let Some(previous) = previous {
                let previous_key = previous.identity().table_key();
                if previous_key != identity_key {
                    let owner = identities
                        .get(previous_key.as_str())
                        .map_err(map_err!(Read))?
                        .map(|guard| guard.value().to_string());
                    if owner.as_deref() == Some(record.id.as_str()) {
                        identities
                            .remove(previous_key.as_str())
                            .map_err(map_err!(Write))?;
                    }
                }
            }

            if record.is_active() {
                identities
                    .insert(identity_key.as_str(), record.id.as_str())
                    .map_err(map_err!(Write))?;
            } else if indexed.as_deref() == Some(record.id.as_str()) {
                identities
                    .remove(identity_key.as_str())
                    .map_err(map_err!(Write))?;
            }

            let value = encode(&record)?;
            deployments
                .insert(record.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            identity_key
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = %record.id, identity = %identity_key, "deployment stored");
        Ok(record)
    }

    /// Get a deployment record by id.
    pub fn get_deployment(&self, id: &str) -> StateResult<Option<DeploymentRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Find the active deployment record for an identity triple.
    pub fn find_active_deployment(
        &self,
        identity: &Identity,
    ) -> StateResult<Option<DeploymentRecord>> {
        let key = identity.table_key();
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let identities = txn
            .open_table(DEPLOYMENT_IDENTITIES)
            .map_err(map_err!(Table))?;
        let id = match identities.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => guard.value().to_string(),
            None => return Ok(None),
        };
        let deployments = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        match deployments.get(id.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: DeploymentRecord = decode(guard.value())?;
                Ok(record.is_active().then_some(record))
            }
            None => Ok(None),
        }
    }

    /// List all deployment records.
    pub fn list_deployments(&self) -> StateResult<Vec<DeploymentRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// Delete a deployment record by id. Returns true if it existed.
    pub fn delete_deployment(&self, id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut deployments = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            let mut identities = txn
                .open_table(DEPLOYMENT_IDENTITIES)
                .map_err(map_err!(Table))?;
            let removed: Option<DeploymentRecord> =
                match deployments.remove(id).map_err(map_err!(Write))? {
                    Some(guard) => Some(decode(guard.value())?),
                    None => None,
                };
            existed = removed.is_some();
            if let Some(record) = removed {
                let key = record.identity().table_key();
                let indexed = identities
                    .get(key.as_str())
                    .map_err(map_err!(Read))?
                    .map(|guard| guard.value().to_string());
                if indexed.as_deref() == Some(id) {
                    identities.remove(key.as_str()).map_err(map_err!(Write))?;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%id, existed, "deployment deleted");
        Ok(existed)
    }

    /// Point a deployment at a new image and advance its version.
    ///
    /// `version` must be exactly one past the stored version; anything else
    /// fails with `StateError::StaleVersion` and leaves the record untouched.
    /// Repeating an update that already landed returns the record unchanged.
    pub fn update_deployment_version(
        &self,
        id: &str,
        image_id: &str,
        version: u64,
    ) -> StateResult<DeploymentRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let record = {
            let mut table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            let mut record: DeploymentRecord = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(StateError::NotFound(format!("deployment {id}"))),
            };
            // A repeated update that already landed is a no-op.
            if version == record.version && record.image.as_deref() == Some(image_id) {
                return Ok(record);
            }
            if version != record.version + 1 {
                return Err(StateError::StaleVersion {
                    id: id.to_string(),
                    current: record.version,
                    requested: version,
                });
            }
            record.image = Some(image_id.to_string());
            record.version = version;
            record.updated_at = epoch_secs();
            let value = encode(&record)?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            record
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%id, image = %image_id, version, "deployment version advanced");
        Ok(record)
    }

    // ── Images ─────────────────────────────────────────────────────

    /// Persist a new image record under a fresh id.
    pub fn create_image(&self, fields: &ImageFields) -> StateResult<ImageRecord> {
        let record = ImageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            fields: fields.clone(),
        };
        self.put_image(&record)?;
        Ok(record)
    }

    /// Insert an image record under its own id (used to import templates).
    ///
    /// Image records are immutable: an id that is already taken fails with
    /// `StateError::Conflict`.
    pub fn put_image(&self, record: &ImageRecord) -> StateResult<()> {
        let value = encode(record)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(IMAGES).map_err(map_err!(Table))?;
            if table
                .get(record.id.as_str())
                .map_err(map_err!(Read))?
                .is_some()
            {
                return Err(StateError::Conflict(format!(
                    "image {} already exists",
                    record.id
                )));
            }
            table
                .insert(record.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = %record.id, image = %record.fields.image, "image stored");
        Ok(())
    }

    /// Get an image record by id.
    pub fn get_image(&self, id: &str) -> StateResult<Option<ImageRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(IMAGES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all image records.
    pub fn list_images(&self) -> StateResult<Vec<ImageRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(IMAGES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    // ── Resources ──────────────────────────────────────────────────

    /// Insert or replace a live resource.
    pub fn put_resource(&self, resource: &ClusterResource) -> StateResult<()> {
        let key = resource.resource_ref().table_key();
        let value = encode(resource)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "resource stored");
        Ok(())
    }

    /// Get a live resource.
    pub fn get_resource(&self, resource: &ResourceRef) -> StateResult<Option<ClusterResource>> {
        let key = resource.table_key();
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Replace the primary container of a live resource.
    pub fn patch_resource(&self, resource: &ResourceRef, patch: &ContainerPatch) -> StateResult<()> {
        let key = resource.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
            let mut current: ClusterResource = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(StateError::NotFound(format!("resource {resource}"))),
            };
            patch.apply_to(&mut current);
            let value = encode(&current)?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, image = %patch.container.image, "resource patched");
        Ok(())
    }

    // ── Settings ───────────────────────────────────────────────────

    /// Store a setting under a dotted key.
    pub fn put_setting<T: Serialize>(&self, key: &str, value: &T) -> StateResult<()> {
        let value = encode(value)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SETTINGS).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "setting stored");
        Ok(())
    }

    /// Read a setting, if it has ever been stored.
    pub fn get_setting<T: DeserializeOwned>(&self, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SETTINGS).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
