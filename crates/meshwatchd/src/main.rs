//! meshwatchd — mesh overlay monitoring daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use meshwatch_core::config::MeshwatchConfig;
use meshwatch_services::{CommandStatus, NmapScanner, Reconciler, SnapshotBuilder};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = MeshwatchConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = MeshwatchConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        MeshwatchConfig::default()
    });

    tracing::info!(
        interval_secs = config.poll.interval_secs,
        scan_timeout_secs = config.poll.scan_timeout_secs,
        status_command = %config.tools.status_command,
        scanner_command = %config.tools.scanner_command,
        "meshwatchd starting"
    );

    // Collaborators and the engine
    let overlay = Arc::new(CommandStatus::new(&config.tools.status_command));
    let scanner = Arc::new(NmapScanner::new(
        &config.tools.scanner_command,
        Duration::from_secs(config.poll.scan_timeout_secs),
    ));
    let builder = SnapshotBuilder::new(
        overlay,
        scanner,
        &config.ports,
        config.poll.max_concurrent_scans,
    );
    let reconciler = Reconciler::new(builder, Duration::from_secs(config.poll.interval_secs));

    let snapshot_rx = reconciler.subscribe();
    let refresh = reconciler.refresh_handle();
    let stats = reconciler.stats();

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let reconciler_task = tokio::spawn(reconciler.run(shutdown_tx.subscribe()));

    let api_port = config.api.port;
    let api_task = {
        let state = meshwatch_api::ApiState {
            snapshot: snapshot_rx,
            refresh,
            stats,
            ports: config.ports.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = meshwatch_api::serve(state, api_port).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = reconciler_task    => tracing::error!("reconciler exited: {:?}", r),
        r = api_task           => tracing::error!("API server exited: {:?}", r),
    }

    Ok(())
}
