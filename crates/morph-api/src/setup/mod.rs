//! Application setup and initialization
//!
//! Everything between a loaded `Config` and a router ready to serve lives here, so the
//! integration tests can build the same application `main` runs.

pub mod routes;
pub mod server;
pub mod services;
pub mod validation;

use crate::constants::SERVICE_NAME;
use crate::state::AppState;
use anyhow::{Context, Result};
use morph_core::Config;
use morph_infra::{init_telemetry, TelemetryOptions};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    init_telemetry(&TelemetryOptions {
        service_name: SERVICE_NAME.to_string(),
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        environment: config.server.environment.clone(),
        json: config.is_production(),
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    validation::validate_config(&config).context("Configuration validation failed")?;

    crate::error::set_hide_error_details(config.is_production());

    tracing::info!("Configuration loaded and validated successfully");

    let state = services::initialize_services(&config).await?;

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
