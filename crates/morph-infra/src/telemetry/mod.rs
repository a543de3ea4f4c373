//! Tracing initialization
//!
//! Human-readable compact output in development, one JSON object per line in production so
//! log shippers can index the structured fields.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "morph=debug,tower_http=debug";

#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    /// Emit JSON lines instead of compact text
    pub json: bool,
}

/// Install the global subscriber. `RUST_LOG` overrides [`DEFAULT_FILTER`].
pub fn init_telemetry(options: &TelemetryOptions) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if options.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()?;
    }

    tracing::info!(
        service = %options.service_name,
        version = %options.service_version,
        environment = %options.environment,
        json = options.json,
        "Tracing initialized"
    );
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown");
}
