//! Morph Core Library
//!
//! This crate provides the domain models, error types, configuration, and validation
//! helpers shared across all Morph components.

pub mod config;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{ApiKey, AssetConfig, Config, ServerConfig, StreamConfig, UpstreamConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
