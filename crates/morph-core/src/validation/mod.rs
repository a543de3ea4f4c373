//! Validation modules

pub mod filename;

pub use filename::{sanitize_upload_filename, FALLBACK_UPLOAD_FILENAME, MAX_FILENAME_LENGTH};
