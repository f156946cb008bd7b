//! Serve mode: the REST API, the bus worker, and the engine in one process.
//!
//! In this mode, the daemon:
//! 1. Opens the state store
//! 2. Seeds the gate from the config file, then overlays persisted flags
//! 3. Builds a standalone engine over the state store
//! 4. Starts the bus worker
//! 5. Serves the REST API until Ctrl-C

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use pinwheel_core::PinwheelConfig;
use pinwheel_reconcile::{GateConfig, GateHandle, ReconciliationEngine};
use pinwheel_state::StateStore;
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::bus::BusWorker;

pub async fn run_serve(port: u16, data_dir: PathBuf, config: PinwheelConfig) -> anyhow::Result<()> {
    info!("Pinwheel daemon starting");

    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("pinwheel.redb");

    // ── State store ──────────────────────────────────────────────
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    // ── Gate flags ───────────────────────────────────────────────
    let gate = GateConfig::from(&config.cicd).overlay_persisted(&store)?;
    let (gate_handle, gate_reader) = GateHandle::channel(gate);
    let gate_handle = gate_handle.with_store(store.clone());
    info!(
        enabled = gate.enabled,
        dirty_patch = gate.dirty_patch,
        "gate flags loaded"
    );

    // ── Engine ───────────────────────────────────────────────────
    let engine = Arc::new(ReconciliationEngine::standalone(
        store.clone(),
        gate_reader,
        &config.reconcile,
    ));
    info!(
        store_timeout_ms = config.reconcile.store_timeout_ms,
        cluster_timeout_ms = config.reconcile.cluster_timeout_ms,
        update_attempts = config.reconcile.update_attempts,
        "reconciliation engine initialized"
    );

    // ── Bus worker ───────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (bus_tx, bus_rx) = mpsc::channel(config.bus.capacity.max(1));
    let worker = BusWorker::new(engine.clone(), bus_rx, config.bus.max_in_flight);
    let bus_handle = tokio::spawn(worker.run(shutdown_rx));
    info!(
        capacity = config.bus.capacity,
        max_in_flight = config.bus.max_in_flight,
        "bus worker initialized"
    );

    // ── REST API server ──────────────────────────────────────────
    let router = pinwheel_api::build_router(pinwheel_api::ApiState {
        store,
        engine,
        gate: gate_handle,
        bus: bus_tx,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let _ = bus_handle.await;

    info!("Pinwheel daemon stopped");
    Ok(())
}
