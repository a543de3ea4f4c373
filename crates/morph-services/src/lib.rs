//! Morph Services Layer
//!
//! This crate is the **business service layer**: outbound calls to third-party services,
//! metadata normalization, the streaming download relay and the expiry scheduler for stored
//! assets. Keep coordination here; keep thin HTTP handling in morph-api.

pub mod cleanup;
pub mod proxy;
pub mod upstream;

pub use cleanup::{ExpiryScheduler, ReapSummary};
pub use morph_storage::{
    create_asset_store, AssetReader, AssetStore, LocalAssetStore, StorageError, StorageResult,
};
pub use proxy::{content_disposition, ProxiedMedia, ProxyError, RelayStream, StreamingProxy};
pub use upstream::{
    normalize, response_reader, try_normalize, BackgroundRemovalService, MetadataService, UpstreamClient,
    UpstreamError, UpstreamResponse,
};
