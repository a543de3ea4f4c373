//! `/api/removebg` and `/uploads` integration tests.
//!
//! Run with: `cargo test -p morph-api --test remove_background_test`

mod helpers;

use std::future::IntoFuture;

use helpers::{image_form, setup_test_app, TEST_REMOVEBG_KEY};
use mockito::Matcher;
use morph_core::models::RemoveBackgroundResponse;

#[tokio::test]
async fn test_remove_background_stores_serves_and_expires() {
    let processed = b"\x89PNG processed image bytes".to_vec();

    let mut upstream = mockito::Server::new_async().await;
    let mock = upstream
        .mock("POST", "/removebg")
        .match_header("x-api-key", TEST_REMOVEBG_KEY)
        .match_body(Matcher::Regex("name=\"image_file\"".to_string()))
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(processed.clone())
        .expect(1)
        .create_async()
        .await;

    let endpoint = format!("{}/removebg", upstream.url());
    let app = setup_test_app(|config| config.upstream.removebg_endpoint = endpoint).await;

    let response = app
        .client()
        .post("/api/removebg")
        .multipart(image_form("cat.png", b"original image"))
        .await;

    response.assert_status_ok();
    let body: RemoveBackgroundResponse = response.json();
    assert_eq!(body.message, "Background removed successfully");
    assert_eq!(body.image.url, "/uploads/bg_removed_cat.png");
    assert_eq!(body.image.size, processed.len() as u64);
    mock.assert_async().await;

    // Served immediately
    let served = app.client().get(&body.image.url).await;
    served.assert_status_ok();
    assert_eq!(served.as_bytes().as_ref(), processed.as_slice());
    assert_eq!(app.state.assets.scheduler.pending_count(), 1);

    // Deletion action, then a second one
    app.state.assets.scheduler.expire("bg_removed_cat.png").await;
    let gone = app.client().get(&body.image.url).await;
    assert_eq!(gone.status_code(), 404);

    app.state
        .assets
        .store
        .delete("bg_removed_cat.png")
        .await
        .expect("second delete succeeds");
    assert!(!app.upload_dir().join("bg_removed_cat.png").exists());
}

#[tokio::test]
async fn test_concurrent_uploads_with_same_name_keep_one_result() {
    let mut upstream = mockito::Server::new_async().await;
    let _first = upstream
        .mock("POST", "/removebg")
        .match_body(Matcher::Regex("first-original".to_string()))
        .with_status(200)
        .with_body("first-processed")
        .create_async()
        .await;
    let _second = upstream
        .mock("POST", "/removebg")
        .match_body(Matcher::Regex("second-original".to_string()))
        .with_status(200)
        .with_body("second-processed")
        .create_async()
        .await;

    let endpoint = format!("{}/removebg", upstream.url());
    let app = setup_test_app(|config| config.upstream.removebg_endpoint = endpoint).await;

    let first = app
        .client()
        .post("/api/removebg")
        .multipart(image_form("same.png", b"first-original"))
        .into_future();
    let second = app
        .client()
        .post("/api/removebg")
        .multipart(image_form("same.png", b"second-original"))
        .into_future();
    let (first, second) = tokio::join!(first, second);
    first.assert_status_ok();
    second.assert_status_ok();

    let stored = std::fs::read(app.upload_dir().join("bg_removed_same.png")).unwrap();
    assert!(
        stored == b"first-processed" || stored == b"second-processed",
        "stored content mixes both uploads: {:?}",
        String::from_utf8_lossy(&stored)
    );

    let leftovers: Vec<_> = std::fs::read_dir(app.upload_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name != "bg_removed_same.png")
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);

    // One timer per name
    assert_eq!(app.state.assets.scheduler.pending_count(), 1);
}

#[tokio::test]
async fn test_missing_key_fails_without_outbound_call() {
    let mut upstream = mockito::Server::new_async().await;
    let mock = upstream
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let endpoint = format!("{}/removebg", upstream.url());
    let app = setup_test_app(|config| {
        config.upstream.removebg_endpoint = endpoint;
        config.upstream.removebg_api_key = None;
    })
    .await;

    let response = app
        .client()
        .post("/api/removebg")
        .multipart(image_form("cat.png", b"original image"))
        .await;

    assert_eq!(response.status_code(), 500);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "CONFIG_ERROR");
    assert!(body["error"].as_str().unwrap().contains("REMOVEBG_API_KEY"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_upload_validation_happens_before_outbound_call() {
    let mut upstream = mockito::Server::new_async().await;
    let mock = upstream
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let endpoint = format!("{}/removebg", upstream.url());
    let app = setup_test_app(|config| config.upstream.removebg_endpoint = endpoint).await;

    // Empty file
    let response = app
        .client()
        .post("/api/removebg")
        .multipart(image_form("cat.png", b""))
        .await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<serde_json::Value>()["error"], "Uploaded image is empty");

    // Wrong field name
    let form = axum_test::multipart::MultipartForm::new().add_text("picture", "not an image");
    let response = app.client().post("/api/removebg").multipart(form).await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<serde_json::Value>()["error"], "No image uploaded");

    // Not multipart at all
    let response = app
        .client()
        .post("/api/removebg")
        .json(&serde_json::json!({"image": "x"}))
        .await;
    assert_eq!(response.status_code(), 400);

    // Wrong method
    let response = app.client().get("/api/removebg").await;
    assert_eq!(response.status_code(), 405);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let mut upstream = mockito::Server::new_async().await;
    let mock = upstream
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let endpoint = format!("{}/removebg", upstream.url());
    let app = setup_test_app(|config| {
        config.upstream.removebg_endpoint = endpoint;
        config.server.max_upload_size_bytes = 1024;
    })
    .await;

    let response = app
        .client()
        .post("/api/removebg")
        .multipart(image_form("big.png", &vec![7u8; 8 * 1024]))
        .await;
    assert_eq!(response.status_code(), 413);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_upstream_rejection_is_reported_and_nothing_stored() {
    let mut upstream = mockito::Server::new_async().await;
    let _mock = upstream
        .mock("POST", "/removebg")
        .with_status(402)
        .with_body(r#"{"errors":[{"title":"Insufficient credits"}]}"#)
        .create_async()
        .await;

    let endpoint = format!("{}/removebg", upstream.url());
    let app = setup_test_app(|config| config.upstream.removebg_endpoint = endpoint).await;

    let response = app
        .client()
        .post("/api/removebg")
        .multipart(image_form("cat.png", b"original image"))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "UPSTREAM_REJECTED");
    assert!(body["error"].as_str().unwrap().starts_with("RemoveBG error:"));
    assert!(!app.upload_dir().join("bg_removed_cat.png").exists());
    assert_eq!(app.state.assets.scheduler.pending_count(), 0);
}

#[tokio::test]
async fn test_uploaded_filename_is_sanitized() {
    let mut upstream = mockito::Server::new_async().await;
    let _mock = upstream
        .mock("POST", "/removebg")
        .with_status(200)
        .with_body("processed")
        .create_async()
        .await;

    let endpoint = format!("{}/removebg", upstream.url());
    let app = setup_test_app(|config| config.upstream.removebg_endpoint = endpoint).await;

    let response = app
        .client()
        .post("/api/removebg")
        .multipart(image_form("../../etc/my cat.png", b"original image"))
        .await;

    response.assert_status_ok();
    let body: RemoveBackgroundResponse = response.json();
    assert_eq!(body.image.url, "/uploads/bg_removed_my_cat.png");
    assert!(app.upload_dir().join("bg_removed_my_cat.png").exists());
}

#[tokio::test]
async fn test_unknown_upload_is_not_found() {
    let app = setup_test_app(|_| {}).await;
    let response = app.client().get("/uploads/bg_removed_never.png").await;
    assert_eq!(response.status_code(), 404);
}
