//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Anything that converts into
//! `AppError` (storage, proxy and extractor failures included) renders the same way: status
//! and code from `ErrorMetadata`, a JSON `ErrorResponse` body, and a log line at the
//! error's level.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use morph_core::{AppError, ErrorMetadata, LogLevel};
use morph_services::{ProxyError, StorageError};
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;

/// Set once at startup from `Config::is_production`
static HIDE_ERROR_DETAILS: AtomicBool = AtomicBool::new(false);

/// Hide `details` and `error_type` from every error body (production).
pub fn set_hide_error_details(hide: bool) {
    HIDE_ERROR_DETAILS.store(hide, Ordering::Relaxed);
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
///
/// Needed because of the orphan rule: `IntoResponse` and `AppError` both live in other crates.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

impl From<validator::ValidationErrors> for HttpAppError {
    fn from(err: validator::ValidationErrors) -> Self {
        HttpAppError(AppError::from(err))
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<MultipartRejection> for HttpAppError {
    fn from(rejection: MultipartRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid multipart request: {}",
            rejection.body_text()
        )))
    }
}

impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        let app = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge("Upload exceeds the maximum allowed size".to_string())
        } else {
            AppError::InvalidInput(format!("Invalid multipart body: {}", err.body_text()))
        };
        HttpAppError(app)
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::UploadFailed(msg)
            | StorageError::DeleteFailed(msg)
            | StorageError::LedgerError(msg) => AppError::LocalIo(msg),
            StorageError::IoError(err) => AppError::LocalIo(err.to_string()),
            StorageError::ConfigError(msg) => AppError::Config(msg),
        };
        HttpAppError(app)
    }
}

impl From<ProxyError> for HttpAppError {
    fn from(err: ProxyError) -> Self {
        HttpAppError(AppError::from(err))
    }
}

/// JSON body extractor that returns our ErrorResponse format (400 + JSON) on deserialization failure.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn error_body(app_error: &AppError, hide_details: bool) -> ErrorResponse {
    let (details, error_type) = if hide_details || app_error.is_sensitive() {
        (None, None)
    } else {
        (
            Some(app_error.detailed_message()),
            Some(app_error.error_type().to_string()),
        )
    };

    ErrorResponse {
        error: app_error.client_message(),
        details,
        error_type,
        code: app_error.error_code().to_string(),
        recoverable: app_error.is_recoverable(),
        suggested_action: app_error.suggested_action().map(String::from),
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = error_body(app_error, HIDE_ERROR_DETAILS.load(Ordering::Relaxed));
        (status, Json(body)).into_response()
    }
}
