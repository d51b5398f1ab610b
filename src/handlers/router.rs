//! Router configuration - centralized route definitions

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::state::AppState;
use super::{flows, health, records};

/// Build the complete API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // =================================================================
        // HEALTH & PROBES
        // =================================================================
        .route("/health", get(health::health))
        .route("/health/live", get(health::health_live))
        .route("/health/ready", get(health::health_ready))
        // =================================================================
        // MULTI-STEP FLOWS
        // =================================================================
        .route("/api/flows/{flow}/step/{step}", post(flows::submit_step))
        .route("/api/flows/{flow}/draft", get(flows::get_draft))
        .route("/api/flows/{flow}/draft", delete(flows::discard_draft))
        // =================================================================
        // DASHBOARDS & RECORD CRUD
        // =================================================================
        .route("/api/{flow}/dashboard", get(records::dashboard))
        .route("/api/records/{id}", get(records::get_record))
        .route("/api/records/{id}", put(records::update_record))
        .route("/api/records/{id}", delete(records::delete_record))
        // =================================================================
        // BILL ACTIONS
        // =================================================================
        .route("/api/bills/{id}/toggle", post(records::toggle_bill))
        .route("/api/bills/unsubscribe", post(records::unsubscribe))
        .route("/api/bills/unsubscribe", get(records::unsubscribe_link))
        // =================================================================
        // STATE
        // =================================================================
        .with_state(state)
}
