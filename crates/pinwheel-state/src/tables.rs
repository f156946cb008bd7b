//! redb table definitions for the Pinwheel record store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types),
//! except the identity index whose values are plain deployment ids.

use redb::TableDefinition;

/// Deployment records keyed by `{id}`.
pub const DEPLOYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("deployments");

/// Active deployment ids keyed by `{namespace}/{name}/{branch}`.
pub const DEPLOYMENT_IDENTITIES: TableDefinition<&str, &str> =
    TableDefinition::new("deployment_identities");

/// Image records and templates keyed by `{id}`.
pub const IMAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("images");

/// Standalone cluster resources keyed by `{cluster}/{namespace}/{name}`.
pub const RESOURCES: TableDefinition<&str, &[u8]> = TableDefinition::new("resources");

/// Dotted settings keys (`cicd.enabled`) to JSON values.
pub const SETTINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");
