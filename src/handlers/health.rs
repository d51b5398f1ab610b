//! Health and readiness endpoints

use axum::{extract::State, http::StatusCode, response::Json};

use super::state::AppState;

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store_backend: String,
    pub records_total: usize,
}

/// Main health check: reports store backend and record count. A store that
/// cannot be read turns the status to "degraded" without failing the
/// request.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.store.clone();
    let count = tokio::task::spawn_blocking(move || store.read_all().map(|r| r.len()))
        .await
        .ok()
        .and_then(|r| r.ok());

    Json(HealthResponse {
        status: if count.is_some() {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        store_backend: state.store.backend_name().to_string(),
        records_total: count.unwrap_or(0),
    })
}

/// Liveness probe - 200 whenever the process can answer at all
pub async fn health_live() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

/// Readiness probe - 503 until the store accepts writes
pub async fn health_ready(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let store = state.store.clone();
    let writable = tokio::task::spawn_blocking(move || store.is_writable())
        .await
        .unwrap_or(false);

    if writable {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "reason": "record store is not writable",
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
        )
    }
}
