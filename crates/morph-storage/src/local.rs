use crate::keys::{self, TEMP_FILE_PREFIX};
use crate::traits::{AssetReader, AssetStore, PendingExpiration, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use morph_core::models::StoredAsset;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::OwnedMutexGuard;

/// Per-name locks serializing publication and removal of the same asset.
///
/// Entries are dropped again once nobody holds or waits for them.
#[derive(Clone, Default)]
struct NameLocks {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl NameLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn acquire(&self, file_name: &str) -> NameGuard {
        let lock = Arc::clone(self.map().entry(file_name.to_string()).or_default());
        let guard = lock.lock_owned().await;
        NameGuard {
            locks: self.clone(),
            file_name: file_name.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }
}

struct NameGuard {
    locks: NameLocks,
    file_name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self.locks.map();
        // Only the map itself still refers to the lock
        if map
            .get(&self.file_name)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.file_name);
        }
    }
}

/// Local filesystem asset store with an on-disk expiry ledger
#[derive(Clone)]
pub struct LocalAssetStore {
    base_path: PathBuf,
    ledger_path: PathBuf,
    public_path: String,
    prefix: String,
    name_locks: NameLocks,
}

impl LocalAssetStore {
    /// Create a new LocalAssetStore instance
    ///
    /// # Arguments
    /// * `base_path` - Publicly served asset directory (e.g., "uploads")
    /// * `ledger_path` - Private directory for expiry records (e.g., ".asset-ledger")
    /// * `public_path` - URL path the asset directory is mounted at (e.g., "/uploads")
    /// * `prefix` - Prefix for derived asset names (e.g., "bg_removed_")
    pub async fn new(
        base_path: impl Into<PathBuf>,
        ledger_path: impl Into<PathBuf>,
        public_path: String,
        prefix: String,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();
        let ledger_path = ledger_path.into();

        for dir in [&base_path, &ledger_path] {
            fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let store = LocalAssetStore {
            base_path,
            ledger_path,
            public_path,
            prefix,
            name_locks: NameLocks::default(),
        };

        // Leftovers from writes interrupted by a previous crash
        let removed = store.remove_stale_temp_files().await?;
        if removed > 0 {
            tracing::warn!(
                removed,
                base_path = %store.base_path.display(),
                "Removed interrupted asset writes"
            );
        }

        Ok(store)
    }

    fn asset_path(&self, file_name: &str) -> StorageResult<PathBuf> {
        keys::validate_asset_name(file_name)?;
        Ok(self.base_path.join(file_name))
    }

    fn ledger_entry_path(&self, file_name: &str) -> PathBuf {
        self.ledger_path.join(keys::ledger_entry_name(file_name))
    }

    fn public_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_path.trim_end_matches('/'), file_name)
    }

    async fn remove_stale_temp_files(&self) -> StorageResult<usize> {
        let mut removed = 0;
        for dir in [&self.base_path, &self.ledger_path] {
            let mut entries = fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                if name.to_string_lossy().starts_with(TEMP_FILE_PREFIX)
                    && remove_if_present(&entry.path()).await?
                {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Copy the reader into a fresh temporary file and return its path and size.
    async fn write_temp_file(&self, mut reader: AssetReader) -> StorageResult<(PathBuf, u64)> {
        let tmp_path = self.base_path.join(keys::temp_file_name());

        let result: io::Result<u64> = async {
            let mut file = fs::File::create(&tmp_path).await?;
            tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok(file.metadata().await?.len())
        }
        .await;

        match result {
            Ok(size) => Ok((tmp_path, size)),
            Err(e) => {
                if let Err(cleanup) = remove_if_present(&tmp_path).await {
                    tracing::warn!(
                        path = %tmp_path.display(),
                        error = %cleanup,
                        "Failed to remove partial asset write"
                    );
                }
                Err(StorageError::UploadFailed(format!(
                    "Failed to write asset stream: {}",
                    e
                )))
            }
        }
    }

    async fn write_ledger_entry(
        &self,
        file_name: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let final_path = self.ledger_entry_path(file_name);
        let tmp_path = self.ledger_path.join(keys::temp_file_name());

        let result = async {
            fs::write(&tmp_path, expires_at.to_rfc3339()).await?;
            fs::rename(&tmp_path, &final_path).await
        }
        .await;

        if let Err(e) = result {
            let _ = remove_if_present(&tmp_path).await;
            return Err(StorageError::LedgerError(format!(
                "Failed to record expiry for {}: {}",
                file_name, e
            )));
        }
        Ok(())
    }

    async fn read_ledger_entry(&self, path: &Path) -> StorageResult<Option<DateTime<Utc>>> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(ts) => Ok(Some(ts.with_timezone(&Utc))),
            Err(e) => {
                // An unreadable record must not keep its asset alive forever
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Malformed expiry record, treating asset as expired"
                );
                Ok(Some(DateTime::<Utc>::UNIX_EPOCH))
            }
        }
    }

    /// Remove the asset and its ledger entry. The caller holds the name lock.
    async fn remove_asset(&self, file_name: &str, path: &Path) -> StorageResult<()> {
        let removed = remove_if_present(path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        remove_if_present(&self.ledger_entry_path(file_name))
            .await
            .map_err(|e| {
                StorageError::LedgerError(format!(
                    "Failed to remove expiry record for {}: {}",
                    file_name, e
                ))
            })?;

        if removed {
            tracing::info!(path = %path.display(), file_name = %file_name, "Asset deleted");
        } else {
            tracing::debug!(file_name = %file_name, "Asset already absent");
        }

        Ok(())
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    #[tracing::instrument(skip(self, reader), fields(operation = "asset_store"))]
    async fn store(
        &self,
        reader: AssetReader,
        original_filename: &str,
        ttl: Duration,
    ) -> StorageResult<StoredAsset> {
        let file_name = keys::derive_asset_name(&self.prefix, original_filename);
        let path = self.asset_path(&file_name)?;
        let start = std::time::Instant::now();

        // The directory may have been removed out from under a long-running process
        fs::create_dir_all(&self.base_path).await?;
        fs::create_dir_all(&self.ledger_path).await?;

        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::ConfigError(format!("Invalid retention window: {}", e)))?;

        let (tmp_path, size_bytes) = self.write_temp_file(reader).await?;

        let _guard = self.name_locks.acquire(&file_name).await;
        let created_at = Utc::now();
        let expires_at = created_at + ttl;

        // Record first so a crash after publishing still leaves the asset reapable
        if let Err(e) = self.write_ledger_entry(&file_name, expires_at).await {
            let _ = remove_if_present(&tmp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = remove_if_present(&tmp_path).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to publish {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            file_name = %file_name,
            size_bytes,
            expires_at = %expires_at,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Asset stored"
        );

        Ok(StoredAsset {
            relative_path: self.public_url(&file_name),
            file_name,
            size_bytes,
            created_at,
            expires_at,
        })
    }

    async fn delete(&self, file_name: &str) -> StorageResult<()> {
        let path = self.asset_path(file_name)?;
        let _guard = self.name_locks.acquire(file_name).await;
        self.remove_asset(file_name, &path).await
    }

    async fn delete_if_expired(&self, file_name: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        let path = self.asset_path(file_name)?;
        let _guard = self.name_locks.acquire(file_name).await;

        match self.read_ledger_entry(&self.ledger_entry_path(file_name)).await? {
            Some(expires_at) if expires_at > now => {
                tracing::debug!(
                    file_name = %file_name,
                    expires_at = %expires_at,
                    "Asset not yet due, keeping it"
                );
                Ok(false)
            }
            _ => {
                self.remove_asset(file_name, &path).await?;
                Ok(true)
            }
        }
    }

    async fn exists(&self, file_name: &str) -> StorageResult<bool> {
        let path = self.asset_path(file_name)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn expires_at(&self, file_name: &str) -> StorageResult<Option<DateTime<Utc>>> {
        keys::validate_asset_name(file_name)?;
        self.read_ledger_entry(&self.ledger_entry_path(file_name))
            .await
    }

    async fn pending_expirations(&self) -> StorageResult<Vec<PendingExpiration>> {
        let mut pending = Vec::new();
        let mut entries = fs::read_dir(&self.ledger_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let entry_name = entry.file_name().to_string_lossy().into_owned();
            let Some(file_name) = keys::asset_name_from_ledger_entry(&entry_name) else {
                continue;
            };
            if keys::validate_asset_name(file_name).is_err() {
                continue;
            }
            if let Some(expires_at) = self.read_ledger_entry(&entry.path()).await? {
                pending.push(PendingExpiration {
                    file_name: file_name.to_string(),
                    expires_at,
                });
            }
        }

        pending.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));
        Ok(pending)
    }
}

/// Remove a file, treating "already gone" as success. Returns whether a file was removed.
async fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::{tempdir, TempDir};

    const DAY: Duration = Duration::from_secs(23 * 3600);

    async fn test_store(dir: &TempDir) -> LocalAssetStore {
        LocalAssetStore::new(
            dir.path().join("uploads"),
            dir.path().join("ledger"),
            "/uploads".to_string(),
            "bg_removed_".to_string(),
        )
        .await
        .unwrap()
    }

    fn reader(data: Vec<u8>) -> AssetReader {
        Box::pin(std::io::Cursor::new(data))
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_store_reports_size_and_public_path() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir).await;
        let data = vec![7u8; 4096];

        let asset = store.store(reader(data.clone()), "cat.png", DAY).await.unwrap();

        assert_eq!(asset.file_name, "bg_removed_cat.png");
        assert_eq!(asset.relative_path, "/uploads/bg_removed_cat.png");
        assert_eq!(asset.size_bytes, 4096);
        assert_eq!(asset.expires_at - asset.created_at, chrono::Duration::hours(23));

        let on_disk = std::fs::read(dir.path().join("uploads/bg_removed_cat.png")).unwrap();
        assert_eq!(on_disk, data);
        assert!(store.exists("bg_removed_cat.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir).await;
        std::fs::remove_dir_all(dir.path().join("uploads")).unwrap();

        let asset = store.store(reader(b"x".to_vec()), "a.png", DAY).await.unwrap();
        assert_eq!(asset.size_bytes, 1);
    }

    #[tokio::test]
    async fn test_store_records_expiry() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir).await;

        let asset = store.store(reader(b"png".to_vec()), "dog.png", DAY).await.unwrap();

        let pending = store.pending_expirations().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].file_name, "bg_removed_dog.png");
        // RFC 3339 keeps sub-second precision
        assert_eq!(pending[0].expires_at, asset.expires_at);
        assert!(!pending[0].is_due(Utc::now()));
        assert_eq!(
            store.expires_at("bg_removed_dog.png").await.unwrap(),
            Some(asset.expires_at)
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir).await;
        store.store(reader(b"data".to_vec()), "x.png", DAY).await.unwrap();

        store.delete("bg_removed_x.png").await.unwrap();
        assert!(!store.exists("bg_removed_x.png").await.unwrap());
        assert!(store.pending_expirations().await.unwrap().is_empty());

        store.delete("bg_removed_x.png").await.unwrap();
        store.delete("never_existed.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_names_rejected() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir).await;

        let result = store.delete("../ledger/secret").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = store.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir).await;
        store
            .store(reader(b"previous".to_vec()), "same.png", DAY)
            .await
            .unwrap();

        let chunks: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "upstream went away")),
        ];
        let failing = tokio_util::io::StreamReader::new(futures::stream::iter(chunks));

        let result = store.store(Box::pin(failing), "same.png", DAY).await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));

        assert_eq!(
            file_names(&dir.path().join("uploads")),
            vec!["bg_removed_same.png".to_string()]
        );
        let on_disk = std::fs::read(dir.path().join("uploads/bg_removed_same.png")).unwrap();
        assert_eq!(on_disk, b"previous");
    }

    #[tokio::test]
    async fn test_concurrent_same_name_last_writer_wins() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(test_store(&dir).await);

        let first = vec![b'a'; 512 * 1024];
        let second = vec![b'b'; 512 * 1024];

        let s1 = store.clone();
        let d1 = first.clone();
        let t1 = tokio::spawn(async move { s1.store(reader(d1), "photo.png", DAY).await });
        let s2 = store.clone();
        let d2 = second.clone();
        let t2 = tokio::spawn(async move { s2.store(reader(d2), "photo.png", DAY).await });

        let a1 = t1.await.unwrap().unwrap();
        let a2 = t2.await.unwrap().unwrap();
        assert_eq!(a1.file_name, a2.file_name);

        let on_disk = std::fs::read(dir.path().join("uploads/bg_removed_photo.png")).unwrap();
        assert!(on_disk == first || on_disk == second);
        assert_eq!(
            file_names(&dir.path().join("uploads")),
            vec!["bg_removed_photo.png".to_string()]
        );
    }

    #[tokio::test]
    async fn test_malformed_ledger_entry_is_due() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir).await;
        std::fs::write(dir.path().join("ledger/bg_removed_old.png.expiry"), "garbage").unwrap();

        let pending = store.pending_expirations().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].is_due(Utc::now()));
    }

    #[tokio::test]
    async fn test_new_removes_interrupted_writes() {
        let dir = tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::write(uploads.join(".tmp-leftover"), b"half").unwrap();
        std::fs::write(uploads.join("bg_removed_keep.png"), b"keep").unwrap();

        let _store = test_store(&dir).await;

        assert_eq!(file_names(&uploads), vec!["bg_removed_keep.png".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_if_expired_checks_current_record() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir).await;
        store.store(reader(b"old".to_vec()), "a.png", Duration::ZERO).await.unwrap();
        let seen_due_at = Utc::now();

        // Stored again after the caller decided the old record was due
        let fresh = store.store(reader(b"new".to_vec()), "a.png", DAY).await.unwrap();

        assert!(!store.delete_if_expired("bg_removed_a.png", seen_due_at).await.unwrap());
        assert!(store.exists("bg_removed_a.png").await.unwrap());
        assert_eq!(
            store.expires_at("bg_removed_a.png").await.unwrap(),
            Some(fresh.expires_at)
        );

        let later = fresh.expires_at + chrono::Duration::seconds(1);
        assert!(store.delete_if_expired("bg_removed_a.png", later).await.unwrap());
        assert!(!store.exists("bg_removed_a.png").await.unwrap());
        assert!(store.pending_expirations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_if_expired_removes_unrecorded_asset() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir).await;
        std::fs::write(dir.path().join("uploads/bg_removed_orphan.png"), b"x").unwrap();

        assert!(store.delete_if_expired("bg_removed_orphan.png", Utc::now()).await.unwrap());
        assert!(!store.exists("bg_removed_orphan.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_and_conditional_delete_serialize_per_name() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(test_store(&dir).await);
        store.store(reader(b"old".to_vec()), "race.png", Duration::ZERO).await.unwrap();
        let seen_due_at = Utc::now();

        let writer = store.clone();
        let data = vec![b'n'; 256 * 1024];
        let upload = tokio::spawn(async move { writer.store(reader(data), "race.png", DAY).await });
        let reaper = store.clone();
        let reap = tokio::spawn(async move {
            reaper.delete_if_expired("bg_removed_race.png", seen_due_at).await
        });

        upload.await.unwrap().unwrap();
        reap.await.unwrap().unwrap();

        // Whichever ran first, the fresh upload stays published with its record
        assert!(store.exists("bg_removed_race.png").await.unwrap());
        let on_disk = std::fs::read(dir.path().join("uploads/bg_removed_race.png")).unwrap();
        assert_eq!(on_disk.len(), 256 * 1024);
        let expires_at = store.expires_at("bg_removed_race.png").await.unwrap();
        assert!(expires_at.is_some_and(|at| at > Utc::now()));
        assert_eq!(store.name_locks.len(), 0);
    }
}
