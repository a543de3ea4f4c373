use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::error::AppError;

/// Request to resolve a social-media link into downloadable renditions
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct MediaQuery {
    /// Source page URL; syntax is checked by the extraction service
    #[validate(
        custom(function = "validate_not_blank"),
        length(max = 2048, message = "URL must be at most 2048 characters")
    )]
    pub url: String,
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("URL is required".into());
        return Err(err);
    }
    Ok(())
}

/// Normalized metadata for a media link.
///
/// When `failed` is true the extraction service reported an error; the remaining fields are
/// returned as-is and may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaMetadata {
    pub url: String,
    pub source: String,
    pub id: String,
    pub author: String,
    pub title: String,
    pub thumbnail: String,
    pub duration_seconds: u64,
    /// Renditions in the order the extraction service returned them
    pub variants: Vec<MediaVariant>,
    pub failed: bool,
}

impl MediaMetadata {
    /// Sentinel returned when the upstream payload cannot be interpreted.
    pub fn failed() -> Self {
        Self {
            failed: true,
            ..Self::default()
        }
    }
}

/// A single downloadable rendition. Width and height are zero for audio-only or unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaVariant {
    pub url: String,
    pub quality: String,
    pub width: u32,
    pub height: u32,
    pub extension: String,
}

/// Query parameters for `GET /api/download`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// Remote media URL to relay
    pub url: Option<String>,
    /// Filename forced in the `Content-Disposition` header
    pub filename: Option<String>,
}

/// Validated download request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub source_url: String,
    pub desired_filename: String,
}

impl StreamRequest {
    /// Builds a request from raw query parameters, applying `default_filename` when the
    /// caller supplied none (or an empty one).
    pub fn from_query(query: DownloadQuery, default_filename: &str) -> Result<Self, AppError> {
        let source_url = query
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::InvalidInput("URL is required".to_string()))?;

        let desired_filename = query
            .filename
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| default_filename.to_string());

        Ok(Self {
            source_url,
            desired_filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_query_rejects_blank_url() {
        let query = MediaQuery {
            url: "   ".to_string(),
        };
        assert!(query.validate().is_err());

        let query = MediaQuery {
            url: "https://www.tiktok.com/@user/video/1".to_string(),
        };
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_stream_request_requires_url() {
        let err = StreamRequest::from_query(DownloadQuery::default(), "video.mp4").unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: URL is required");

        let query = DownloadQuery {
            url: Some(String::new()),
            filename: Some("clip.mp4".to_string()),
        };
        assert!(StreamRequest::from_query(query, "video.mp4").is_err());
    }

    #[test]
    fn test_stream_request_defaults_empty_filename() {
        let query = DownloadQuery {
            url: Some("https://cdn.example.com/a.mp4".to_string()),
            filename: Some(String::new()),
        };
        let req = StreamRequest::from_query(query, "video.mp4").unwrap();
        assert_eq!(req.desired_filename, "video.mp4");
        assert_eq!(req.source_url, "https://cdn.example.com/a.mp4");
    }

    #[test]
    fn test_failed_sentinel() {
        let meta = MediaMetadata::failed();
        assert!(meta.failed);
        assert!(meta.variants.is_empty());
    }
}
