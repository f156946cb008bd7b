//! Reconciliation error types.
//!
//! Expected skips are not errors; see [`crate::outcome::SkipReason`].

use pinwheel_core::EventError;
use thiserror::Error;

/// Errors that propagate out of `ReconciliationEngine::handle`.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store unavailable during {op}: {reason}")]
    StoreUnavailable { op: &'static str, reason: String },

    #[error("cluster unavailable during {op}: {reason}")]
    ClusterUnavailable { op: &'static str, reason: String },

    #[error("malformed image reference {url:?}: {reason}")]
    MalformedReference { url: String, reason: String },

    #[error("invalid publish event: {0}")]
    InvalidEvent(#[from] EventError),
}

impl ReconcileError {
    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::StoreUnavailable { .. } => "store_unavailable",
            ReconcileError::ClusterUnavailable { .. } => "cluster_unavailable",
            ReconcileError::MalformedReference { .. } => "malformed_reference",
            ReconcileError::InvalidEvent(_) => "invalid_event",
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
