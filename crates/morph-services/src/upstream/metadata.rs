use morph_core::models::{MediaMetadata, MediaQuery};
use morph_core::{ApiKey, AppError, UpstreamConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::json;

use super::client::UpstreamClient;
use super::normalize::normalize;

const SERVICE: &str = "metadata service";

/// Resolves social-media links through the RapidAPI extraction endpoint.
#[derive(Clone)]
pub struct MetadataService {
    client: UpstreamClient,
    endpoint: String,
    api_host: String,
    api_key: ApiKey,
}

impl MetadataService {
    /// Fails with [`AppError::Config`] when no RapidAPI key is configured.
    pub fn new(client: UpstreamClient, config: &UpstreamConfig) -> Result<Self, AppError> {
        let api_key = config
            .rapidapi_key
            .clone()
            .ok_or_else(|| AppError::Config("RAPIDAPI_KEY is not configured".to_string()))?;

        Ok(Self {
            client,
            endpoint: config.metadata_endpoint.clone(),
            api_host: config.metadata_api_host.clone(),
            api_key,
        })
    }

    fn headers(&self) -> Result<HeaderMap, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-rapidapi-key"),
            HeaderValue::from_str(self.api_key.expose())
                .map_err(|_| AppError::Config("RAPIDAPI_KEY is not a valid header value".into()))?,
        );
        headers.insert(
            HeaderName::from_static("x-rapidapi-host"),
            HeaderValue::from_str(&self.api_host).map_err(|_| {
                AppError::Config("METADATA_API_HOST is not a valid header value".into())
            })?,
        );
        Ok(headers)
    }

    /// Resolve a link. A non-success answer still yields metadata, flagged as failed.
    #[tracing::instrument(skip(self, query), fields(operation = "resolve_metadata"))]
    pub async fn resolve(&self, query: &MediaQuery) -> Result<MediaMetadata, AppError> {
        let response = self
            .client
            .post_json(&self.endpoint, self.headers()?, &json!({ "url": query.url }))
            .await
            .map_err(|e| e.into_app_error(SERVICE))?;

        let mut metadata = normalize(&response.body);
        if !response.is_success() {
            tracing::warn!(
                status = response.status.as_u16(),
                "Metadata service answered with an error status"
            );
            metadata.failed = true;
        }

        tracing::info!(
            source = %metadata.source,
            variants = metadata.variants.len(),
            failed = metadata.failed,
            "Metadata resolved"
        );

        Ok(metadata)
    }
}
