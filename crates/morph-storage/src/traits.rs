//! Asset store abstraction
//!
//! This module defines the `AssetStore` trait implemented by storage backends for transient
//! derived files.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use morph_core::models::StoredAsset;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Expiry ledger error: {0}")]
    LedgerError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte source consumed by [`AssetStore::store`]
pub type AssetReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Expiry record read back from the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExpiration {
    pub file_name: String,
    pub expires_at: DateTime<Utc>,
}

impl PendingExpiration {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Storage for derived assets that are publicly served for a limited time.
///
/// The store owns every asset from creation until deletion. Names are derived by the store
/// from the caller's original filename; writes of the same derived name follow
/// "last writer wins".
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persist the full contents of `reader` and record that the asset expires after `ttl`.
    ///
    /// On error nothing new is published, but callers should treat the asset state as
    /// unknown.
    async fn store(
        &self,
        reader: AssetReader,
        original_filename: &str,
        ttl: Duration,
    ) -> StorageResult<StoredAsset>;

    /// Remove an asset and its expiry record. Deleting a missing asset succeeds.
    async fn delete(&self, file_name: &str) -> StorageResult<()>;

    /// Remove an asset only if its current expiry record is due at `now`, or it has none.
    ///
    /// The check and the removal are atomic with respect to [`AssetStore::store`] of the same
    /// name, so an asset stored again after the caller listed it is kept. Returns whether the
    /// asset was removed.
    async fn delete_if_expired(&self, file_name: &str, now: DateTime<Utc>) -> StorageResult<bool>;

    /// Check if an asset is currently published
    async fn exists(&self, file_name: &str) -> StorageResult<bool>;

    /// Recorded expiry of an asset, if it has one
    async fn expires_at(&self, file_name: &str) -> StorageResult<Option<DateTime<Utc>>>;

    /// Every expiry record in the ledger, due or not.
    async fn pending_expirations(&self) -> StorageResult<Vec<PendingExpiration>>;
}
