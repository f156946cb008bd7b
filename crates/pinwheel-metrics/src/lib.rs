//! pinwheel-metrics: observability for reconciliation outcomes.
//!
//! Counts every outcome the reconciler produces (applied actions, named
//! skips, and propagated errors) and renders them in the Prometheus text
//! exposition format.
//!
//! # Architecture
//!
//! ```text
//! OutcomeCollector
//!   ├── record_outcome() ← called once per handled event
//!   ├── record_error()   ← called when handling propagates an error
//!   └── snapshot()       → sorted samples
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod collector;
pub mod prometheus;

pub use collector::{OutcomeCollector, OutcomeSample};
pub use prometheus::render_prometheus;
