//! Asset and ledger naming.
//!
//! Asset names are `{prefix}{sanitized original filename}`. Ledger records are
//! `{asset name}.expiry` in the ledger directory. Temporary files start with `.tmp-`.

use morph_core::validation::sanitize_upload_filename;
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

pub const TEMP_FILE_PREFIX: &str = ".tmp-";
pub const LEDGER_SUFFIX: &str = ".expiry";

/// Derive the published asset name for an uploaded file.
pub fn derive_asset_name(prefix: &str, original_filename: &str) -> String {
    format!("{}{}", prefix, sanitize_upload_filename(original_filename))
}

/// Unique name for an in-flight write inside the asset directory.
pub fn temp_file_name() -> String {
    format!("{}{}", TEMP_FILE_PREFIX, Uuid::new_v4())
}

pub fn ledger_entry_name(asset_name: &str) -> String {
    format!("{}{}", asset_name, LEDGER_SUFFIX)
}

/// Reverse of [`ledger_entry_name`]; `None` for files that are not ledger records.
pub fn asset_name_from_ledger_entry(entry_name: &str) -> Option<&str> {
    entry_name
        .strip_suffix(LEDGER_SUFFIX)
        .filter(|name| !name.is_empty())
}

/// Reject anything that is not a single plain file name inside the asset directory.
pub fn validate_asset_name(name: &str) -> StorageResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.starts_with(TEMP_FILE_PREFIX)
    {
        return Err(StorageError::InvalidKey(format!(
            "Invalid asset name: {:?}",
            name
        )));
    }
    Ok(())
}
