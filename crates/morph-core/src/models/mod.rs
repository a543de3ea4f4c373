//! Data models for the application
//!
//! Caller-facing request and response shapes. Wire naming is `snake_case`.

mod asset;
mod media;

pub use asset::*;
pub use media::*;
