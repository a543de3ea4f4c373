//! Streaming download relay.
//!
//! The source body is never materialized: [`ProxiedMedia::into_body_stream`] hands the
//! response chunks to the HTTP layer as they arrive, and dropping that stream (client gone)
//! drops the outbound response and its connection.

mod disposition;
mod relay;
pub mod ssrf;

pub use disposition::content_disposition;
pub use relay::RelayStream;

use morph_core::{AppError, StreamConfig};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use std::time::Duration;

use ssrf::{check_source_url, SourceUrlError};

const SERVICE: &str = "media source";
const MAX_REDIRECTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("{0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Forbidden(String),

    /// The source could not be reached, or stalled before answering
    #[error("transport error: {0}")]
    Transport(String),

    #[error("source responded with status {status}")]
    SourceRejected { status: u16 },
}

impl From<SourceUrlError> for ProxyError {
    fn from(err: SourceUrlError) -> Self {
        match err {
            SourceUrlError::Invalid(msg) => ProxyError::InvalidUrl(msg),
            SourceUrlError::Forbidden(msg) => ProxyError::Forbidden(msg),
            SourceUrlError::Unresolvable(host) => {
                ProxyError::Transport(format!("could not resolve {}", host))
            }
        }
    }
}

impl From<ProxyError> for AppError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::InvalidUrl(msg) | ProxyError::Forbidden(msg) => AppError::InvalidInput(msg),
            ProxyError::Transport(message) => AppError::UpstreamTransport {
                service: SERVICE,
                message,
            },
            ProxyError::SourceRejected { status } => AppError::UpstreamRejected {
                service: SERVICE,
                status,
                body: format!("source responded with status {}", status),
            },
        }
    }
}

/// An opened source whose body has not been read yet
pub struct ProxiedMedia {
    pub content_type: Option<HeaderValue>,
    pub content_length: Option<u64>,
    response: reqwest::Response,
    idle_timeout: Duration,
    source_host: String,
}

impl std::fmt::Debug for ProxiedMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxiedMedia")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("source_host", &self.source_host)
            .finish()
    }
}

impl ProxiedMedia {
    /// Body as a stream of chunks, each bounded by the idle timeout.
    pub fn into_body_stream(self) -> RelayStream {
        RelayStream::new(
            Box::pin(self.response.bytes_stream()),
            self.idle_timeout,
            self.source_host,
        )
    }
}

#[derive(Clone)]
pub struct StreamingProxy {
    http: reqwest::Client,
    idle_timeout: Duration,
    allow_private_hosts: bool,
}

impl StreamingProxy {
    pub fn new(config: &StreamConfig) -> Result<Self, AppError> {
        let allow_private_hosts = config.allow_private_source_urls;

        let redirect = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            if !allow_private_hosts && ssrf::is_forbidden_literal(attempt.url()) {
                return attempt.error("redirect to an internal address");
            }
            attempt.follow()
        });

        // No total timeout: transfers may legitimately run for a long time
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(redirect)
            .user_agent(crate::upstream::client::USER_AGENT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            allow_private_hosts,
        })
    }

    /// Validate `source_url` and GET it. Only a success response is returned; nothing has
    /// been sent to the caller when this fails.
    #[tracing::instrument(skip(self, source_url), fields(operation = "open_source"))]
    pub async fn open(&self, source_url: &str) -> Result<ProxiedMedia, ProxyError> {
        if source_url.trim().is_empty() {
            return Err(ProxyError::InvalidUrl("URL is required".to_string()));
        }

        let url = check_source_url(source_url, self.allow_private_hosts).await?;
        let source_host = url.host_str().unwrap_or_default().to_string();
        let start = std::time::Instant::now();

        let response = tokio::time::timeout(self.idle_timeout, self.http.get(url).send())
            .await
            .map_err(|_| {
                ProxyError::Transport(format!(
                    "no response within {}s",
                    self.idle_timeout.as_secs()
                ))
            })?
            .map_err(|e| ProxyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                source_host = %source_host,
                status = status.as_u16(),
                "Source rejected download"
            );
            return Err(ProxyError::SourceRejected {
                status: status.as_u16(),
            });
        }

        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let content_length = response.content_length();

        tracing::info!(
            source_host = %source_host,
            content_type = ?content_type,
            content_length = ?content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Source opened for relay"
        );

        Ok(ProxiedMedia {
            content_type,
            content_length,
            response,
            idle_timeout: self.idle_timeout,
            source_host,
        })
    }
}
