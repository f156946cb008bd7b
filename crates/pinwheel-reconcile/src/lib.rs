//! pinwheel-reconcile: the deployment reconciliation engine.
//!
//! Given a publish event, the engine decides whether to patch a live
//! cluster resource, mint a new image version, or skip, and applies that
//! decision to at most one resource.
//!
//! # Components
//!
//! - **`resolver`**: digest-pinned image reference from a publish event
//! - **`lookup`**: deployment record for an identity triple
//! - **`patcher`**: direct patch of a live resource (the "dirty patch")
//! - **`version`**: new image record from a template, version advance
//! - **`gate`**: `enabled` / `dirty_patch` flags, read once per event
//! - **`lock`**: per-identity serialization
//! - **`engine`**: the decision tree tying the above together
//!
//! ```text
//! PublishNotice ─► into_event ─► ReconciliationEngine::handle
//!                                  ├── gate check
//!                                  ├── branch guard (bus deliveries)
//!                                  ├── IdentityLocks::acquire
//!                                  ├── DeploymentLookup
//!                                  └── LivePatcher | VersionCreator
//! ```

pub mod collaborators;
pub mod engine;
pub mod error;
pub mod gate;
pub mod lock;
pub mod lookup;
pub mod outcome;
pub mod patcher;
pub mod resolver;
pub mod standalone;
pub mod version;

#[cfg(test)]
mod fakes;

pub use collaborators::{ClusterControl, Collaborators, DeploymentStore, ImageStore, Timeouts};
pub use engine::ReconciliationEngine;
pub use error::{ReconcileError, ReconcileResult};
pub use gate::{GateConfig, GateHandle, GateReader};
pub use lock::IdentityLocks;
pub use outcome::{Delivery, Outcome, SkipReason};
pub use resolver::resolve;
