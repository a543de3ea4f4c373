use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A derived file persisted in the asset directory and publicly served until it expires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredAsset {
    /// Public path, e.g. `/uploads/bg_removed_cat.png`
    pub relative_path: String,
    /// Name of the file inside the asset directory
    pub file_name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Image descriptor returned by `POST /api/removebg`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemovedBackgroundImage {
    /// Public path of the processed image
    pub url: String,
    /// Size in bytes
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemoveBackgroundResponse {
    pub message: String,
    pub image: RemovedBackgroundImage,
}

impl From<&StoredAsset> for RemoveBackgroundResponse {
    fn from(asset: &StoredAsset) -> Self {
        Self {
            message: "Background removed successfully".to_string(),
            image: RemovedBackgroundImage {
                url: asset.relative_path.clone(),
                size: asset.size_bytes,
            },
        }
    }
}
