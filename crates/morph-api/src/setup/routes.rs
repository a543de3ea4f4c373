//! Route configuration and setup.

use crate::constants::{API_PREFIX, MAX_CONCURRENT_REQUESTS};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use morph_core::Config;
use morph_infra::{request_id_middleware, security_headers_middleware, SecurityHeaders};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;
    let max_upload = config.server.max_upload_size_bytes;

    let api_routes = Router::new()
        .route(
            &format!("{}/metadata", API_PREFIX),
            post(handlers::metadata::resolve_metadata),
        )
        .route(
            &format!("{}/download", API_PREFIX),
            get(handlers::download::download),
        )
        .route(
            &format!("{}/removebg", API_PREFIX),
            post(handlers::remove_background::remove_background),
        )
        .route("/health", get(handlers::health::health_check))
        .route("/live", get(handlers::health::liveness_check))
        .route(
            &format!("{}/openapi.json", API_PREFIX),
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .with_state(state);

    let security_headers = SecurityHeaders {
        hsts: config.is_production(),
    };

    tracing::info!(
        public_path = %config.assets.public_path,
        max_upload_bytes = max_upload,
        concurrency_limit = MAX_CONCURRENT_REQUESTS,
        "Routes configured"
    );

    let app = api_routes
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"))
        .nest_service(
            &config.assets.public_path,
            ServeDir::new(&config.assets.upload_dir),
        )
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(RequestBodyLimitLayer::new(max_upload))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn_with_state(
            security_headers,
            security_headers_middleware,
        ));

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    let cors = if config.server.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .server
            .cors_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|_| anyhow::anyhow!("Invalid CORS origin: {}", o))
            })
            .collect::<Result<Vec<_>, _>>()?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
