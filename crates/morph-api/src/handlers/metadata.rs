use std::sync::Arc;

use axum::{extract::State, Json};
use morph_core::models::{MediaMetadata, MediaQuery};
use validator::Validate;

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

/// Resolve a video URL into direct media links
///
/// The extraction service's own failure flag is reported as `failed`; the remaining fields
/// are returned as far as the service filled them.
#[utoipa::path(
    post,
    path = "/api/metadata",
    tag = "media",
    request_body = MediaQuery,
    responses(
        (status = 200, description = "Normalized metadata", body = MediaMetadata),
        (status = 400, description = "Missing or invalid url", body = ErrorResponse),
        (status = 500, description = "Extraction service unreachable or not configured", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(operation = "metadata_request"))]
pub async fn resolve_metadata(
    State(state): State<Arc<AppState>>,
    ValidatedJson(query): ValidatedJson<MediaQuery>,
) -> Result<Json<MediaMetadata>, HttpAppError> {
    query.validate()?;

    let service = state.upstream.metadata.get()?;
    let metadata = service.resolve(&query).await?;

    Ok(Json(metadata))
}
