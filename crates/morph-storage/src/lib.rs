//! Morph Storage Library
//!
//! Transient asset storage for derived files (background-removed images).
//!
//! # Layout
//!
//! Two directories are involved:
//!
//! - the **asset directory**, served publicly, holding `<prefix><sanitized name>` files;
//! - the **ledger directory**, never served, holding one `<file name>.expiry` record per
//!   asset with its RFC 3339 expiry timestamp.
//!
//! Assets are published by writing a uniquely named temporary file and renaming it into
//! place, so concurrent writers of the same derived name never interleave: the last rename
//! wins. Name derivation is centralized in the `keys` module.

pub mod factory;
pub(crate) mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use factory::create_asset_store;
pub use local::LocalAssetStore;
pub use traits::{AssetReader, AssetStore, PendingExpiration, StorageError, StorageResult};
