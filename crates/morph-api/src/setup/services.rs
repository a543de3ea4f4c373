//! Service and state construction

use anyhow::{Context, Result};
use morph_core::Config;
use morph_services::{
    create_asset_store, BackgroundRemovalService, ExpiryScheduler, MetadataService,
    StreamingProxy, UpstreamClient,
};
use std::sync::Arc;

use crate::state::{AppState, AssetState, Credentialed, DownloadState, UpstreamState};

/// Build every service from configuration. Spawns nothing; the sweeper is started by the
/// server.
pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let client = UpstreamClient::new(config.upstream_timeout())
        .context("Failed to build upstream HTTP client")?;

    let upstream = UpstreamState {
        metadata: Credentialed::from_result(MetadataService::new(
            client.clone(),
            &config.upstream,
        )),
        background_removal: Credentialed::from_result(BackgroundRemovalService::new(
            client,
            &config.upstream,
        )),
    };

    let download = DownloadState {
        proxy: StreamingProxy::new(&config.stream).context("Failed to build download proxy")?,
        default_filename: config.stream.default_filename.clone(),
    };

    let store = create_asset_store(&config.assets)
        .await
        .context("Failed to initialize asset store")?;
    let scheduler = Arc::new(ExpiryScheduler::new(
        store.clone(),
        config.assets.max_pending_deletions,
    ));

    tracing::info!(
        metadata_ready = upstream.metadata.is_ready(),
        background_removal_ready = upstream.background_removal.is_ready(),
        retention_hours = config.assets.retention_hours,
        "Services initialized"
    );

    Ok(Arc::new(AppState {
        config: config.clone(),
        upstream,
        download,
        assets: AssetState {
            store,
            scheduler,
            retention: config.asset_retention(),
        },
    }))
}
