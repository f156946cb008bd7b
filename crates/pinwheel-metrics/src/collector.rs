//! Outcome collector: counts reconciliation results.
//!
//! Counters are atomics behind a map keyed by `(outcome, reason)`; the map
//! lock is only taken for writing the first time a key is seen.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::debug;

/// Outcome label used for propagated errors.
pub const ERROR_OUTCOME: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct CounterKey {
    outcome: String,
    reason: String,
}

/// A single counter value at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeSample {
    /// `patched`, `version_created`, `skipped`, or `error`.
    pub outcome: String,
    /// Skip reason or error kind; empty for applied actions.
    pub reason: String,
    pub count: u64,
}

/// Shared, cloneable outcome counters.
#[derive(Clone, Default)]
pub struct OutcomeCollector {
    counters: Arc<RwLock<HashMap<CounterKey, Arc<AtomicU64>>>>,
}

impl OutcomeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one handled event.
    pub async fn record_outcome(&self, outcome: &str, reason: &str) {
        self.counter(outcome, reason)
            .await
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Count one event whose handling failed with `kind`.
    pub async fn record_error(&self, kind: &str) {
        self.record_outcome(ERROR_OUTCOME, kind).await;
    }

    /// Current counter values, sorted by outcome then reason.
    pub async fn snapshot(&self) -> Vec<OutcomeSample> {
        let counters = self.counters.read().await;
        let mut samples: Vec<(CounterKey, u64)> = counters
            .iter()
            .map(|(key, count)| (key.clone(), count.load(Ordering::Relaxed)))
            .collect();
        samples.sort();
        samples
            .into_iter()
            .map(|(key, count)| OutcomeSample {
                outcome: key.outcome,
                reason: key.reason,
                count,
            })
            .collect()
    }

    async fn counter(&self, outcome: &str, reason: &str) -> Arc<AtomicU64> {
        let key = CounterKey {
            outcome: outcome.to_string(),
            reason: reason.to_string(),
        };
        if let Some(counter) = self.counters.read().await.get(&key) {
            return counter.clone();
        }
        let mut counters = self.counters.write().await;
        counters
            .entry(key)
            .or_insert_with(|| {
                debug!(%outcome, %reason, "registered outcome counter");
                Arc::new(AtomicU64::new(0))
            })
            .clone()
    }
}
