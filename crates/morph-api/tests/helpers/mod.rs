//! Test helpers: build AppState and router for integration tests.
//!
//! Every app gets its own temporary asset and ledger directories. Upstream services are
//! pointed at a `mockito` server by the test that needs them.

#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use morph_api::setup::{routes, services};
use morph_api::AppState;
use morph_core::{ApiKey, Config};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_RAPIDAPI_KEY: &str = "test-rapidapi-key";
pub const TEST_REMOVEBG_KEY: &str = "test-removebg-key";

/// Test application: server, state, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn upload_dir(&self) -> &Path {
        &self.state.config.assets.upload_dir
    }
}

/// Development config rooted in `dir`, with both credentials set and private source URLs
/// allowed so the mock server on 127.0.0.1 is reachable.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.assets.upload_dir = dir.join("uploads");
    config.assets.ledger_dir = dir.join("ledger");
    config.upstream.rapidapi_key = Some(ApiKey::new(TEST_RAPIDAPI_KEY));
    config.upstream.removebg_api_key = Some(ApiKey::new(TEST_REMOVEBG_KEY));
    config.upstream.timeout_secs = 5;
    config.stream.allow_private_source_urls = true;
    config.stream.idle_timeout_secs = 5;
    config
}

/// Setup a test app; `configure` adjusts the default test config (endpoints, keys).
pub async fn setup_test_app(configure: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = TempDir::new().expect("create temp dir");
    let mut config = test_config(temp_dir.path());
    configure(&mut config);

    let state = services::initialize_services(&config)
        .await
        .expect("initialize services");
    let router = routes::setup_routes(&config, state.clone()).expect("setup routes");
    let server = TestServer::new(router).expect("start test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

/// Multipart form with one `image` file field.
pub fn image_form(file_name: &str, data: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part(
        "image",
        Part::bytes(data.to_vec())
            .file_name(file_name.to_string())
            .mime_type("image/png"),
    )
}
