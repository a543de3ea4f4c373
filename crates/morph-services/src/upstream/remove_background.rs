use bytes::Bytes;
use morph_core::{ApiKey, AppError, UpstreamConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};

use super::client::UpstreamClient;

const SERVICE: &str = "RemoveBG";

/// Client for the remove.bg background-removal API.
#[derive(Clone)]
pub struct BackgroundRemovalService {
    client: UpstreamClient,
    endpoint: String,
    api_key: ApiKey,
}

impl BackgroundRemovalService {
    /// Fails with [`AppError::Config`] when no remove.bg key is configured.
    pub fn new(client: UpstreamClient, config: &UpstreamConfig) -> Result<Self, AppError> {
        let api_key = config
            .removebg_api_key
            .clone()
            .ok_or_else(|| AppError::Config("REMOVEBG_API_KEY is not configured".to_string()))?;

        Ok(Self {
            client,
            endpoint: config.removebg_endpoint.clone(),
            api_key,
        })
    }

    /// Submit an image and return the successful response with its body unread.
    ///
    /// The body is the processed image; stream it with
    /// [`response_reader`](super::client::response_reader).
    #[tracing::instrument(skip(self, image), fields(operation = "remove_background", size_bytes = image.len()))]
    pub async fn remove_background(
        &self,
        image: Bytes,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, AppError> {
        let mut part = Part::bytes(image.to_vec()).file_name(filename.to_string());
        if let Some(content_type) = content_type {
            part = part
                .mime_str(content_type)
                .map_err(|_| AppError::InvalidInput("Invalid image content type".to_string()))?;
        }
        let form = Form::new().part("image_file", part);

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(self.api_key.expose()).map_err(|_| {
                AppError::Config("REMOVEBG_API_KEY is not a valid header value".into())
            })?,
        );

        let response = self
            .client
            .post_multipart(&self.endpoint, headers, form)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Background removal failed");
                e.into_app_error(SERVICE)
            })?;

        Ok(response)
    }
}
