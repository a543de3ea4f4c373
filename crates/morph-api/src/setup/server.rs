//! Server startup and graceful shutdown

use crate::state::AppState;
use anyhow::Result;
use axum::Router;
use morph_core::Config;
use morph_infra::shutdown_telemetry;
use std::sync::Arc;
use std::time::Duration;

/// Start the expiry sweeper, serve until SIGINT/SIGTERM, then stop pending deletions.
pub async fn start_server(config: &Config, state: Arc<AppState>, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server.port);
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let sweeper = state
        .assets
        .scheduler
        .clone()
        .start_sweeper(Duration::from_secs(config.assets.sweep_interval_secs));

    tracing::info!(
        upload_dir = %config.assets.upload_dir.display(),
        retention_hours = config.assets.retention_hours,
        sweep_interval_secs = config.assets.sweep_interval_secs,
        max_upload_mb = config.server.max_upload_size_bytes / 1024 / 1024,
        "Server ready and accepting connections"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.abort();
    state.assets.scheduler.shutdown();
    shutdown_telemetry().await;

    served?;
    Ok(())
}

/// Resolves on Ctrl+C (SIGINT) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
