//! pinwheel-state: embedded record store for Pinwheel.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for deployment records, image records (templates included), the
//! live resources of the standalone cluster, and persisted settings.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Deployments are keyed by id, with a secondary identity index
//! (`{namespace}/{name}/{branch}` → id) that holds active records only.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use pinwheel_core::types::*;
pub use store::StateStore;
