//! ReconciliationEngine: the per-event decision tree.
//!
//! Each event is handled to completion or an explicit skip. There is no
//! pending state held between events; idempotence lives in the two action
//! paths, each with its own notion of "already applied".

use pinwheel_core::config::ReconcileConfig;
use pinwheel_core::{PackagePublishedEvent, PublishNotice};
use pinwheel_metrics::OutcomeCollector;
use pinwheel_state::StateStore;
use tracing::{info, warn};

use crate::collaborators::{Collaborators, Timeouts};
use crate::error::{ReconcileError, ReconcileResult};
use crate::gate::GateReader;
use crate::lock::IdentityLocks;
use crate::lookup::DeploymentLookup;
use crate::outcome::{Delivery, Outcome, SkipReason};
use crate::patcher::LivePatcher;
use crate::version::VersionCreator;

pub struct ReconciliationEngine {
    gate: GateReader,
    lookup: DeploymentLookup,
    patcher: LivePatcher,
    versions: VersionCreator,
    locks: IdentityLocks,
    metrics: OutcomeCollector,
}

impl ReconciliationEngine {
    pub fn new(collaborators: Collaborators, gate: GateReader, config: &ReconcileConfig) -> Self {
        let timeouts = Timeouts::from(config);
        Self {
            gate,
            lookup: DeploymentLookup::new(collaborators.deployments.clone(), timeouts.store),
            patcher: LivePatcher::new(collaborators.cluster, timeouts.cluster),
            versions: VersionCreator::new(
                collaborators.deployments,
                collaborators.images,
                timeouts.store,
                config.update_attempts,
            ),
            locks: IdentityLocks::new(),
            metrics: OutcomeCollector::new(),
        }
    }

    /// Engine whose collaborators all live in the embedded state store.
    pub fn standalone(store: StateStore, gate: GateReader, config: &ReconcileConfig) -> Self {
        Self::new(Collaborators::standalone(store), gate, config)
    }

    /// Record outcomes into a shared collector.
    pub fn with_metrics(mut self, metrics: OutcomeCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &OutcomeCollector {
        &self.metrics
    }

    /// Apply producer defaults to a raw notice, then handle it.
    pub async fn handle_notice(
        &self,
        notice: PublishNotice,
        delivery: Delivery,
    ) -> ReconcileResult<Outcome> {
        match notice.into_event() {
            Ok(event) => self.handle(&event, delivery).await,
            Err(e) => {
                let err = ReconcileError::from(e);
                self.record_failure(None, &err).await;
                Err(err)
            }
        }
    }

    /// Reconcile one publish event.
    pub async fn handle(
        &self,
        event: &PackagePublishedEvent,
        delivery: Delivery,
    ) -> ReconcileResult<Outcome> {
        match self.reconcile(event, delivery).await {
            Ok(outcome) => {
                self.metrics
                    .record_outcome(outcome.label(), outcome.reason())
                    .await;
                info!(
                    identity = %event.identity(),
                    version = %event.version,
                    ?delivery,
                    outcome = outcome.label(),
                    reason = outcome.reason(),
                    "publish event reconciled"
                );
                Ok(outcome)
            }
            Err(err) => {
                self.record_failure(Some(event), &err).await;
                Err(err)
            }
        }
    }

    async fn reconcile(
        &self,
        event: &PackagePublishedEvent,
        delivery: Delivery,
    ) -> ReconcileResult<Outcome> {
        let gate = self.gate.snapshot();
        if !gate.enabled {
            return Ok(Outcome::Skipped(SkipReason::Disabled));
        }

        // Bus notices cover every push; only the branch tag itself counts.
        if delivery == Delivery::Bus && !event.url.contains(event.branch_tag().as_str()) {
            return Ok(Outcome::Skipped(SkipReason::BranchMismatch));
        }

        let identity = event.identity();
        let _guard = self.locks.acquire(&identity).await;

        let Some(deployment) = self.lookup.find_by_identity(&identity).await? else {
            return Ok(Outcome::Skipped(SkipReason::NoDeployment));
        };

        if deployment.patch {
            if !gate.dirty_patch {
                return Ok(Outcome::Skipped(SkipReason::DirtyPatchDisabled));
            }
            self.patcher.patch(event, &deployment).await
        } else {
            self.versions.create_version(event, &deployment).await
        }
    }

    async fn record_failure(
        &self,
        event: Option<&PackagePublishedEvent>,
        err: &ReconcileError,
    ) {
        self.metrics.record_error(err.kind()).await;
        match event {
            Some(event) => warn!(
                identity = %event.identity(),
                version = %event.version,
                kind = err.kind(),
                error = %err,
                "publish event failed"
            ),
            None => warn!(kind = err.kind(), error = %err, "publish notice rejected"),
        }
    }
}
