use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use bytes::Bytes;
use morph_core::models::RemoveBackgroundResponse;
use morph_core::validation::{sanitize_upload_filename, FALLBACK_UPLOAD_FILENAME};
use morph_core::AppError;
use morph_services::response_reader;

use crate::constants::IMAGE_FIELD;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

struct ImageUpload {
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

/// Pull the `image` field out of the form, skipping any other parts.
async fn read_image_field(multipart: &mut Multipart) -> Result<ImageUpload, HttpAppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(sanitize_upload_filename)
            .unwrap_or_else(|| FALLBACK_UPLOAD_FILENAME.to_string());
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;

        if data.is_empty() {
            return Err(AppError::InvalidInput("Uploaded image is empty".to_string()).into());
        }

        return Ok(ImageUpload {
            file_name,
            content_type,
            data,
        });
    }

    Err(AppError::InvalidInput("No image uploaded".to_string()).into())
}

/// Remove an image's background and publish the result for a limited time
///
/// The processed image is written to the asset directory and served under its public path
/// until the retention window elapses.
#[utoipa::path(
    post,
    path = "/api/removebg",
    tag = "images",
    request_body(content = inline(Object), content_type = "multipart/form-data", description = "Form with an `image` file field"),
    responses(
        (status = 200, description = "Background removed", body = RemoveBackgroundResponse),
        (status = 400, description = "Missing or empty image, or rejected by the removal service", body = ErrorResponse),
        (status = 413, description = "Upload too large", body = ErrorResponse),
        (status = 500, description = "Removal service not configured or unreachable, or local storage failure", body = ErrorResponse),
        (status = 502, description = "Removal service failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "remove_background"))]
pub async fn remove_background(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RemoveBackgroundResponse>, HttpAppError> {
    let service = state.upstream.background_removal.get()?;
    let mut multipart = multipart?;

    let upload = read_image_field(&mut multipart).await?;
    tracing::debug!(
        file_name = %upload.file_name,
        size_bytes = upload.data.len(),
        "Image received"
    );

    let response = service
        .remove_background(
            upload.data,
            &upload.file_name,
            upload.content_type.as_deref(),
        )
        .await?;

    let asset = state
        .assets
        .store
        .store(
            response_reader(response),
            &upload.file_name,
            state.assets.retention,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, file_name = %upload.file_name, "Failed to store processed image");
            HttpAppError::from(e)
        })?;

    if !state
        .assets
        .scheduler
        .schedule_delete(&asset.file_name, state.assets.retention)
    {
        tracing::warn!(
            file_name = %asset.file_name,
            "Deletion table full, leaving asset to the sweeper"
        );
    }

    tracing::info!(
        file_name = %asset.file_name,
        size_bytes = asset.size_bytes,
        expires_at = %asset.expires_at,
        "Background removed"
    );

    Ok(Json(RemoveBackgroundResponse::from(&asset)))
}
