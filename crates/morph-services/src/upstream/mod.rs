//! Calls to third-party services and interpretation of their answers.

pub mod client;
pub mod metadata;
pub mod normalize;
pub mod remove_background;

pub use client::{response_reader, UpstreamClient, UpstreamError, UpstreamResponse};
pub use metadata::MetadataService;
pub use normalize::{normalize, try_normalize};
pub use remove_background::BackgroundRemovalService;
