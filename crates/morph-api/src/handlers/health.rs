//! Health check handlers and response types.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, ToSchema)]
pub struct CredentialStatus {
    pub metadata: bool,
    pub background_removal: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthCheckResponse {
    /// `healthy` or `degraded`
    pub status: String,
    /// `healthy`, `timeout` or `unhealthy: {reason}`
    pub storage: String,
    pub credentials: CredentialStatus,
    pub pending_deletions: usize,
}

/// Write and remove a probe file in the upload directory.
async fn probe_upload_dir(state: &AppState) -> String {
    let probe = state.config.assets.upload_dir.join(".tmp-health-probe");
    let check = async {
        tokio::fs::write(&probe, b"ok").await?;
        tokio::fs::remove_file(&probe).await
    };

    match tokio::time::timeout(CHECK_TIMEOUT, check).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("unhealthy: {}", e),
        Err(_) => "timeout".to_string(),
    }
}

/// Liveness probe - process is running.
#[utoipa::path(
    get,
    path = "/live",
    tag = "health",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Upload directory writability and configured credentials
///
/// Missing credentials degrade the status but do not fail the check; the affected route
/// reports the configuration error itself.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service healthy or degraded", body = HealthCheckResponse),
        (status = 503, description = "Upload directory not writable", body = HealthCheckResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let storage = probe_upload_dir(&state).await;
    let credentials = CredentialStatus {
        metadata: state.upstream.metadata.is_ready(),
        background_removal: state.upstream.background_removal.is_ready(),
    };

    let storage_ok = storage == "healthy";
    let status = if storage_ok && credentials.metadata && credentials.background_removal {
        "healthy"
    } else {
        "degraded"
    };

    if !storage_ok {
        tracing::error!(storage = %storage, "Upload directory health check failed");
    }

    let status_code = if storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthCheckResponse {
            status: status.to_string(),
            storage,
            credentials,
            pending_deletions: state.assets.scheduler.pending_count(),
        }),
    )
}
