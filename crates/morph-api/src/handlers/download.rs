use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use morph_core::models::{DownloadQuery, StreamRequest};
use morph_core::AppError;
use morph_services::content_disposition;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Relay a remote file as an attachment
///
/// The body is streamed from the source as it arrives. Once headers are sent a failing
/// source can only terminate the connection.
#[utoipa::path(
    get,
    path = "/api/download",
    tag = "media",
    params(DownloadQuery),
    responses(
        (status = 200, description = "Source bytes with a forced download filename", content_type = "application/octet-stream"),
        (status = 400, description = "Missing, invalid or refused url, or the source answered 4xx", body = ErrorResponse),
        (status = 500, description = "Source unreachable", body = ErrorResponse),
        (status = 502, description = "Source answered with a server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(operation = "download"))]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, HttpAppError> {
    let request = StreamRequest::from_query(query, &state.download.default_filename)?;

    let media = state.download.proxy.open(&request.source_url).await?;

    let disposition = HeaderValue::from_str(&content_disposition(&request.desired_filename))
        .map_err(|e| AppError::Internal(format!("Invalid Content-Disposition: {}", e)))?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_DISPOSITION, disposition);

    if let Some(content_type) = media.content_type.clone() {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    if let Some(length) = media.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    tracing::debug!(filename = %request.desired_filename, "Relaying download");

    builder
        .body(Body::from_stream(media.into_body_stream()))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)).into())
}
