//! API constants

/// Prefix for every caller-facing JSON and download route
pub const API_PREFIX: &str = "/api";

pub const SERVICE_NAME: &str = "morph-api";

/// Multipart field carrying the image for `POST /api/removebg`
pub const IMAGE_FIELD: &str = "image";

/// Cap on concurrently processed requests
pub const MAX_CONCURRENT_REQUESTS: usize = 1024;
