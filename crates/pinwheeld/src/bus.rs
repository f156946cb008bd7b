//! Event-bus worker.
//!
//! Drains queued publish notices and hands each to the engine as a bus
//! delivery. Notices for different packages run concurrently, up to
//! `max_in_flight`; the engine serializes notices for the same package.
//! Failed notices are not retried here. Redelivery belongs to the producer.

use std::sync::Arc;

use pinwheel_core::PublishNotice;
use pinwheel_reconcile::{Delivery, ReconciliationEngine};
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct BusWorker {
    engine: Arc<ReconciliationEngine>,
    rx: mpsc::Receiver<PublishNotice>,
    permits: Arc<Semaphore>,
}

impl BusWorker {
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        rx: mpsc::Receiver<PublishNotice>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            engine,
            rx,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Run until the queue closes or `shutdown` flips, then wait for
    /// in-flight notices to finish.
    ///
    /// On shutdown the queue is closed to new notices and everything already
    /// accepted is still dispatched.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("bus worker started");
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                notice = self.rx.recv() => {
                    let Some(notice) = notice else { break };
                    self.dispatch(&mut tasks, notice).await;
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                _ = shutdown.changed() => {
                    self.rx.close();
                    let mut drained = 0usize;
                    while let Some(notice) = self.rx.recv().await {
                        self.dispatch(&mut tasks, notice).await;
                        drained += 1;
                    }
                    info!(drained, "bus queue closed, accepted notices dispatched");
                    break;
                }
            }
        }
        while tasks.join_next().await.is_some() {}
        info!("bus worker stopped");
    }

    async fn dispatch(&self, tasks: &mut JoinSet<()>, notice: PublishNotice) {
        let package = notice.name.clone();
        let Ok(permit) = self.permits.clone().acquire_owned().await else {
            warn!(%package, "bus permits closed, notice dropped");
            return;
        };
        let engine = self.engine.clone();
        tasks.spawn(async move {
            let _permit = permit;
            // The engine logs and counts failures itself.
            if let Err(e) = engine.handle_notice(notice, Delivery::Bus).await {
                debug!(%package, kind = e.kind(), "bus notice dropped");
            }
        });
    }
}
