//! Configuration module
//!
//! Configuration is loaded once at process start (`Config::from_env`), validated, and then
//! passed explicitly to every component that needs it. Nothing reads the environment after
//! startup.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// Common constants
const SERVER_PORT: u16 = 8080;
const MAX_UPLOAD_SIZE_MB: usize = 25;
const UPSTREAM_TIMEOUT_SECS: u64 = 30;
const STREAM_CONNECT_TIMEOUT_SECS: u64 = 10;
const STREAM_IDLE_TIMEOUT_SECS: u64 = 60;
const ASSET_RETENTION_HOURS: u64 = 23;
const ASSET_SWEEP_INTERVAL_SECS: u64 = 3600;
const MAX_PENDING_DELETIONS: usize = 10_000;

pub const DEFAULT_DOWNLOAD_FILENAME: &str = "video.mp4";
pub const DEFAULT_METADATA_ENDPOINT: &str =
    "https://social-download-all-in-one.p.rapidapi.com/v1/social/autolink";
pub const DEFAULT_METADATA_API_HOST: &str = "social-download-all-in-one.p.rapidapi.com";
pub const DEFAULT_REMOVEBG_ENDPOINT: &str = "https://api.remove.bg/v1.0/removebg";
pub const DEFAULT_CORS_ORIGINS: &str =
    "https://imagemorph-abiola.netlify.app,http://localhost:5173,http://localhost:3000";

/// Third-party API credential. Never printed: `Debug` redacts the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw key, for placing into an outbound request header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub max_upload_size_bytes: usize,
}

/// Third-party service endpoints and credentials
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    /// RapidAPI key for the video-link extraction service
    pub rapidapi_key: Option<ApiKey>,
    /// remove.bg API key
    pub removebg_api_key: Option<ApiKey>,
    pub metadata_endpoint: String,
    pub metadata_api_host: String,
    pub removebg_endpoint: String,
    /// Total timeout for metadata and background-removal calls
    pub timeout_secs: u64,
}

/// Streaming download proxy settings
#[derive(Clone, Debug)]
pub struct StreamConfig {
    pub connect_timeout_secs: u64,
    /// Maximum wait for the next chunk from the source before the relay is aborted
    pub idle_timeout_secs: u64,
    pub default_filename: String,
    /// Disables the private-address guard on source URLs (local development and tests)
    pub allow_private_source_urls: bool,
}

/// Transient asset storage settings
#[derive(Clone, Debug)]
pub struct AssetConfig {
    pub upload_dir: PathBuf,
    /// URL path under which `upload_dir` is served, e.g. `/uploads`
    pub public_path: String,
    /// Directory holding one expiry record per stored asset
    pub ledger_dir: PathBuf,
    pub prefix: String,
    pub retention_hours: u64,
    pub sweep_interval_secs: u64,
    pub max_pending_deletions: usize,
}

/// Application configuration
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub stream: StreamConfig,
    pub assets: AssetConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: SERVER_PORT,
            environment: "development".to_string(),
            cors_origins: split_list(DEFAULT_CORS_ORIGINS),
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            rapidapi_key: None,
            removebg_api_key: None,
            metadata_endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
            metadata_api_host: DEFAULT_METADATA_API_HOST.to_string(),
            removebg_endpoint: DEFAULT_REMOVEBG_ENDPOINT.to_string(),
            timeout_secs: UPSTREAM_TIMEOUT_SECS,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: STREAM_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: STREAM_IDLE_TIMEOUT_SECS,
            default_filename: DEFAULT_DOWNLOAD_FILENAME.to_string(),
            allow_private_source_urls: false,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            public_path: "/uploads".to_string(),
            ledger_dir: PathBuf::from(".asset-ledger"),
            prefix: "bg_removed_".to_string(),
            retention_hours: ASSET_RETENTION_HOURS,
            sweep_interval_secs: ASSET_SWEEP_INTERVAL_SECS,
            max_pending_deletions: MAX_PENDING_DELETIONS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins =
            split_list(&env::var("CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.into()));

        let server = ServerConfig {
            port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            cors_origins,
            max_upload_size_bytes: env_or("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB) * 1024 * 1024,
        };

        let upstream = UpstreamConfig {
            rapidapi_key: env_secret("RAPIDAPI_KEY"),
            removebg_api_key: env_secret("REMOVEBG_API_KEY"),
            metadata_endpoint: env::var("METADATA_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_METADATA_ENDPOINT.to_string()),
            metadata_api_host: env::var("METADATA_API_HOST")
                .unwrap_or_else(|_| DEFAULT_METADATA_API_HOST.to_string()),
            removebg_endpoint: env::var("REMOVEBG_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_REMOVEBG_ENDPOINT.to_string()),
            timeout_secs: env_or("UPSTREAM_TIMEOUT_SECS", UPSTREAM_TIMEOUT_SECS),
        };

        let stream = StreamConfig {
            connect_timeout_secs: env_or("STREAM_CONNECT_TIMEOUT_SECS", STREAM_CONNECT_TIMEOUT_SECS),
            idle_timeout_secs: env_or("STREAM_IDLE_TIMEOUT_SECS", STREAM_IDLE_TIMEOUT_SECS),
            default_filename: env::var("DEFAULT_DOWNLOAD_FILENAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_FILENAME.to_string()),
            allow_private_source_urls: env_or("ALLOW_PRIVATE_SOURCE_URLS", false),
        };

        let assets = AssetConfig {
            upload_dir: PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into())),
            public_path: env::var("ASSET_PUBLIC_PATH").unwrap_or_else(|_| "/uploads".into()),
            ledger_dir: PathBuf::from(
                env::var("ASSET_LEDGER_DIR").unwrap_or_else(|_| ".asset-ledger".into()),
            ),
            prefix: env::var("ASSET_PREFIX").unwrap_or_else(|_| "bg_removed_".into()),
            retention_hours: env_or("ASSET_RETENTION_HOURS", ASSET_RETENTION_HOURS),
            sweep_interval_secs: env_or("ASSET_SWEEP_INTERVAL_SECS", ASSET_SWEEP_INTERVAL_SECS),
            max_pending_deletions: env_or("MAX_PENDING_DELETIONS", MAX_PENDING_DELETIONS),
        };

        let config = Config {
            server,
            upstream,
            stream,
            assets,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.server.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Names of the credentials that are not configured.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.upstream.rapidapi_key.is_none() {
            missing.push("RAPIDAPI_KEY");
        }
        if self.upstream.removebg_api_key.is_none() {
            missing.push("REMOVEBG_API_KEY");
        }
        missing
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }

    pub fn asset_retention(&self) -> Duration {
        Duration::from_secs(self.assets.retention_hours * 3600)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() {
            if self.server.cors_origins.iter().any(|o| o == "*") {
                return Err(anyhow::anyhow!(
                    "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
                ));
            }

            let missing = self.missing_credentials();
            if !missing.is_empty() {
                return Err(anyhow::anyhow!(
                    "{} must be set in production",
                    missing.join(" and ")
                ));
            }
        }

        if self.upstream.timeout_secs == 0 {
            return Err(anyhow::anyhow!("UPSTREAM_TIMEOUT_SECS cannot be 0"));
        }

        if self.stream.connect_timeout_secs == 0 {
            return Err(anyhow::anyhow!("STREAM_CONNECT_TIMEOUT_SECS cannot be 0"));
        }

        if self.stream.idle_timeout_secs == 0 {
            return Err(anyhow::anyhow!("STREAM_IDLE_TIMEOUT_SECS cannot be 0"));
        }

        if self.assets.retention_hours == 0 {
            return Err(anyhow::anyhow!("ASSET_RETENTION_HOURS cannot be 0"));
        }

        if self.assets.max_pending_deletions == 0 {
            return Err(anyhow::anyhow!("MAX_PENDING_DELETIONS cannot be 0"));
        }

        if self.assets.sweep_interval_secs == 0 {
            return Err(anyhow::anyhow!("ASSET_SWEEP_INTERVAL_SECS cannot be 0"));
        }

        if !self.assets.public_path.starts_with('/') {
            return Err(anyhow::anyhow!("ASSET_PUBLIC_PATH must start with '/'"));
        }

        // Anything under the upload directory is publicly served
        if self.assets.ledger_dir.starts_with(&self.assets.upload_dir) {
            return Err(anyhow::anyhow!(
                "ASSET_LEDGER_DIR must not be UPLOAD_DIR or a directory inside it"
            ));
        }

        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().to_lowercase().parse().ok())
        .unwrap_or(default)
}

fn env_secret(key: &str) -> Option<ApiKey> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(ApiKey::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production_config() -> Config {
        let mut config = Config::default();
        config.server.environment = "production".to_string();
        config.upstream.rapidapi_key = Some(ApiKey::new("rapid"));
        config.upstream.removebg_api_key = Some(ApiKey::new("removebg"));
        config
    }

    #[test]
    fn test_defaults_match_service_policy() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.stream.default_filename, "video.mp4");
        assert_eq!(config.assets.prefix, "bg_removed_");
        assert_eq!(config.asset_retention(), Duration::from_secs(23 * 3600));
        assert_eq!(config.upstream_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret-value");
        let printed = format!("{:?}", key);
        assert!(!printed.contains("super-secret-value"));
        assert_eq!(key.expose(), "super-secret-value");
    }

    #[test]
    fn test_development_allows_missing_credentials() {
        let config = Config::default();
        assert_eq!(
            config.missing_credentials(),
            vec!["RAPIDAPI_KEY", "REMOVEBG_API_KEY"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_credentials() {
        let mut config = production_config();
        assert!(config.validate().is_ok());

        config.upstream.removebg_api_key = None;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("REMOVEBG_API_KEY"));
    }

    #[test]
    fn test_production_rejects_wildcard_cors() {
        let mut config = production_config();
        config.server.cors_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ledger_dir_must_differ_from_upload_dir() {
        let mut config = Config::default();
        config.assets.ledger_dir = config.assets.upload_dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ledger_dir_must_not_be_inside_upload_dir() {
        let mut config = Config::default();
        config.assets.upload_dir = PathBuf::from("data/uploads");
        config.assets.ledger_dir = PathBuf::from("data/uploads/.ledger");
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("ASSET_LEDGER_DIR"));

        // A sibling sharing the name prefix is fine
        config.assets.ledger_dir = PathBuf::from("data/uploads-ledger");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let mut config = Config::default();
        config.assets.sweep_interval_secs = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("ASSET_SWEEP_INTERVAL_SECS"));
    }

    #[test]
    fn test_zero_connect_timeout_rejected() {
        let mut config = Config::default();
        config.stream.connect_timeout_secs = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("STREAM_CONNECT_TIMEOUT_SECS"));
    }

    #[test]
    fn test_split_list_trims_and_drops_empty() {
        assert_eq!(
            split_list(" a.com, ,b.com "),
            vec!["a.com".to_string(), "b.com".to_string()]
        );
    }
}
