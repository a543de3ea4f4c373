//! Configuration validation
//!
//! `Config::validate` holds the hard rules; this adds the startup warnings for settings that
//! are legal but worth an operator's attention.

use anyhow::Result;
use morph_core::Config;

/// Validate configuration and log warnings for risky settings
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    // The asset directory cannot shadow the API routes
    if config.assets.public_path.trim_end_matches('/').is_empty()
        || config.assets.public_path.starts_with(crate::constants::API_PREFIX)
    {
        return Err(anyhow::anyhow!(
            "ASSET_PUBLIC_PATH must be a dedicated path such as /uploads"
        ));
    }

    for key in config.missing_credentials() {
        tracing::warn!(
            credential = key,
            "Credential not configured; the routes that need it will answer with CONFIG_ERROR"
        );
    }

    if config.stream.allow_private_source_urls {
        if config.is_production() {
            return Err(anyhow::anyhow!(
                "ALLOW_PRIVATE_SOURCE_URLS cannot be enabled in production"
            ));
        }
        tracing::warn!("Private source URLs allowed for downloads; do not use outside development");
    }

    if config.server.cors_origins.is_empty() {
        tracing::warn!("CORS_ORIGINS is empty; browsers on other origins will be refused");
    }

    Ok(())
}
