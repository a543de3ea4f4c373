//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use morph_core::models;

/// The OpenAPI document served at `/api/openapi.json`.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Morph API",
        version = "0.1.0",
        description = "Resolve social video links, relay remote media as downloads, and remove image backgrounds. Processed images are served under /uploads until they expire."
    ),
    paths(
        handlers::metadata::resolve_metadata,
        handlers::download::download,
        handlers::remove_background::remove_background,
        handlers::health::health_check,
        handlers::health::liveness_check,
    ),
    components(schemas(
        models::MediaQuery,
        models::MediaMetadata,
        models::MediaVariant,
        models::RemoveBackgroundResponse,
        models::RemovedBackgroundImage,
        handlers::health::HealthCheckResponse,
        handlers::health::CredentialStatus,
        error::ErrorResponse,
    )),
    tags(
        (name = "media", description = "Video link resolution and download relay"),
        (name = "images", description = "Background removal"),
        (name = "health", description = "Health probes"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let spec = get_openapi_spec();
        for path in ["/api/metadata", "/api/download", "/api/removebg", "/health", "/live"] {
            assert!(spec.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
