//! Outbound HTTP client for third-party APIs.
//!
//! One request per call. JSON answers are small and read fully; multipart answers are handed
//! back unread so binary results can be streamed straight to disk.

use bytes::Bytes;
use futures::TryStreamExt;
use morph_core::AppError;
use morph_storage::AssetReader;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Serialize;
use std::io;
use std::time::Duration;
use tokio_util::io::StreamReader;

pub const USER_AGENT: &str = concat!("morph/", env!("CARGO_PKG_VERSION"));

/// Upper bound on error bodies kept for diagnostics
const MAX_ERROR_BODY_CHARS: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The exchange never completed (DNS, connect, TLS, timeout, broken body)
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The service answered with a non-success status
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl UpstreamError {
    /// Attribute the failure to a named service for the caller-facing error.
    pub fn into_app_error(self, service: &'static str) -> AppError {
        match self {
            UpstreamError::Transport(e) => AppError::UpstreamTransport {
                service,
                message: e.to_string(),
            },
            UpstreamError::Rejected { status, body } => AppError::UpstreamRejected {
                service,
                status,
                body,
            },
        }
    }
}

/// A fully read upstream answer, successful or not
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
}

impl UpstreamClient {
    /// Build a client whose requests are bounded by `timeout` end to end.
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// POST a JSON body and read the answer whatever its status.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        headers: HeaderMap,
        body: &T,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let start = std::time::Instant::now();

        let response = self
            .http
            .post(endpoint)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(UpstreamError::Transport)?;

        tracing::debug!(
            endpoint = %endpoint,
            status = status.as_u16(),
            body_bytes = body.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upstream JSON call completed"
        );

        Ok(UpstreamResponse { status, body })
    }

    /// POST a multipart form. Success hands back the unread response; any other status is
    /// surfaced as [`UpstreamError::Rejected`] with the body captured.
    pub async fn post_multipart(
        &self,
        endpoint: &str,
        headers: HeaderMap,
        form: reqwest::multipart::Form,
    ) -> Result<reqwest::Response, UpstreamError> {
        let start = std::time::Instant::now();

        let response = self
            .http
            .post(endpoint)
            .headers(headers)
            .multipart(form)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        let status = response.status();
        tracing::debug!(
            endpoint = %endpoint,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upstream multipart call answered"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                body: truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS),
            });
        }

        Ok(response)
    }
}

/// Adapt a response body into a reader without buffering it.
pub fn response_reader(response: reqwest::Response) -> AssetReader {
    let stream = response.bytes_stream().map_err(io::Error::other);
    Box::pin(StreamReader::new(Box::pin(stream)))
}

fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}
