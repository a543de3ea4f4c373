//! Application state and sub-states.
//!
//! `AppState` is built once at startup and shared behind an `Arc`. It is split by concern so
//! each handler reads only the part it needs.

use morph_core::{AppError, Config, ErrorMetadata};
use morph_services::{
    AssetStore, BackgroundRemovalService, ExpiryScheduler, MetadataService, StreamingProxy,
};
use std::sync::Arc;
use std::time::Duration;

/// A third-party client that could only be built if its credential was configured.
///
/// Outside production a missing key does not stop startup; the route answers with the
/// recorded configuration error instead and never calls out.
#[derive(Clone)]
pub enum Credentialed<T> {
    Ready(T),
    Missing(String),
}

impl<T> Credentialed<T> {
    pub fn from_result(result: Result<T, AppError>) -> Self {
        match result {
            Ok(service) => Credentialed::Ready(service),
            Err(err) => Credentialed::Missing(err.client_message()),
        }
    }

    pub fn get(&self) -> Result<&T, AppError> {
        match self {
            Credentialed::Ready(service) => Ok(service),
            Credentialed::Missing(reason) => Err(AppError::Config(reason.clone())),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Credentialed::Ready(_))
    }
}

/// Outbound third-party integrations
#[derive(Clone)]
pub struct UpstreamState {
    pub metadata: Credentialed<MetadataService>,
    pub background_removal: Credentialed<BackgroundRemovalService>,
}

/// Streaming download relay
#[derive(Clone)]
pub struct DownloadState {
    pub proxy: StreamingProxy,
    pub default_filename: String,
}

/// Stored derived assets and their expiry
#[derive(Clone)]
pub struct AssetState {
    pub store: Arc<dyn AssetStore>,
    pub scheduler: Arc<ExpiryScheduler>,
    pub retention: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub upstream: UpstreamState,
    pub download: DownloadState,
    pub assets: AssetState,
}
