use crate::{AssetStore, LocalAssetStore, StorageResult};
use morph_core::AssetConfig;
use std::sync::Arc;

/// Create the asset store described by configuration
pub async fn create_asset_store(config: &AssetConfig) -> StorageResult<Arc<dyn AssetStore>> {
    let store = LocalAssetStore::new(
        &config.upload_dir,
        &config.ledger_dir,
        config.public_path.clone(),
        config.prefix.clone(),
    )
    .await?;

    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        ledger_dir = %config.ledger_dir.display(),
        public_path = %config.public_path,
        "Asset store initialized"
    );

    Ok(Arc::new(store))
}
