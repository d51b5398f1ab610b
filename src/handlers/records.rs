//! Record CRUD and dashboard handlers
//!
//! Every read is scoped by owner key; a record belonging to someone else is
//! indistinguishable from a missing one (404).

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use std::str::FromStr;
use tracing::info;

use super::state::AppState;
use super::types::{
    DashboardResponse, DeleteRecordResponse, OwnerQuery, ToggleBillRequest, ToggleBillResponse,
    UnsubscribeRequest, UnsubscribeResponse, UpdateRecordRequest, UpdateRecordResponse,
};
use super::utils::run_blocking;
use crate::drafts::FlowKind;
use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::records::{BillStatus, Record, RecordId, RecordKind, RecordPayload};
use crate::validation;

fn flow_record_kind(flow: FlowKind) -> RecordKind {
    match flow {
        FlowKind::Budget => RecordKind::Budget,
        FlowKind::Bill => RecordKind::Bill,
        FlowKind::NetWorth => RecordKind::NetWorth,
        FlowKind::EmergencyFund => RecordKind::EmergencyFund,
        FlowKind::FinancialHealth => RecordKind::FinancialHealth,
        FlowKind::Quiz => RecordKind::QuizResult,
    }
}

fn parse_flow(flow: &str) -> Result<FlowKind> {
    FlowKind::from_str(flow).map_err(|reason| AppError::InvalidInput {
        field: "flow".to_string(),
        reason,
    })
}

/// Fetch a record and enforce ownership in one step
async fn owned_record(state: &AppState, id: RecordId, owner_key: &str) -> Result<Record> {
    let store = state.store.clone();
    let record = run_blocking(move || store.get_by_id(id)).await?;
    match record {
        Some(record) if record.owner_key == owner_key => Ok(record),
        _ => Err(AppError::RecordNotFound(id.to_string())),
    }
}

/// GET /api/{flow}/dashboard?owner_key= - the owner's records for one
/// domain, newest first
pub async fn dashboard(
    State(state): State<AppState>,
    Path(flow): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<DashboardResponse>> {
    let flow = parse_flow(&flow)?;
    validation::validate_owner_key(&query.owner_key).map_validation_err("owner_key")?;

    let kind = flow_record_kind(flow);
    let store = state.store.clone();
    let owner_key = query.owner_key.clone();
    let mut records = run_blocking(move || store.filter_by_owner(&owner_key)).await?;

    records.retain(|r| r.payload.kind() == kind);
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total = records.len();
    Ok(Json(DashboardResponse {
        flow: flow.as_str().to_string(),
        records,
        total,
    }))
}

/// GET /api/records/{id}?owner_key=
pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Record>> {
    let id = validation::validate_record_id(&id)
        .map_err(|e| AppError::InvalidRecordId(e.to_string()))?;
    validation::validate_owner_key(&query.owner_key).map_validation_err("owner_key")?;

    let record = owned_record(&state, id, &query.owner_key).await?;
    Ok(Json(record))
}

/// PUT /api/records/{id} - replace the payload. The payload kind cannot
/// change; the envelope is immutable.
pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateRecordRequest>,
) -> Result<Json<UpdateRecordResponse>> {
    let id = validation::validate_record_id(&id)
        .map_err(|e| AppError::InvalidRecordId(e.to_string()))?;
    validation::validate_owner_key(&request.owner_key).map_validation_err("owner_key")?;

    let existing = owned_record(&state, id, &request.owner_key).await?;
    if existing.payload.kind() != request.payload.kind() {
        return Err(AppError::InvalidInput {
            field: "payload".to_string(),
            reason: format!(
                "cannot change record kind from '{}' to '{}'",
                existing.payload.kind(),
                request.payload.kind()
            ),
        });
    }

    let store = state.store.clone();
    let payload = request.payload;
    let updated = run_blocking(move || store.update_by_id(id, payload)).await?;
    if !updated {
        // Deleted between the ownership check and the write.
        return Err(AppError::RecordNotFound(id.to_string()));
    }

    Ok(Json(UpdateRecordResponse {
        id: id.to_string(),
        updated: true,
    }))
}

/// DELETE /api/records/{id}?owner_key= - idempotent; deleting an absent
/// record reports `deleted: false` with 200
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<DeleteRecordResponse>> {
    let id = validation::validate_record_id(&id)
        .map_err(|e| AppError::InvalidRecordId(e.to_string()))?;
    validation::validate_owner_key(&query.owner_key).map_validation_err("owner_key")?;

    let store = state.store.clone();
    let owner_key = query.owner_key.clone();
    let deleted = run_blocking(move || {
        // Only the owner's record may be deleted; an absent or foreign id
        // is a no-op.
        match store.get_by_id(id)? {
            Some(record) if record.owner_key == owner_key => store.delete_by_id(id),
            _ => Ok(false),
        }
    })
    .await?;

    Ok(Json(DeleteRecordResponse {
        id: id.to_string(),
        deleted,
    }))
}

/// POST /api/bills/{id}/toggle - flip a bill between paid and unpaid
pub async fn toggle_bill(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ToggleBillRequest>,
) -> Result<Json<ToggleBillResponse>> {
    let id = validation::validate_record_id(&id)
        .map_err(|e| AppError::InvalidRecordId(e.to_string()))?;
    validation::validate_owner_key(&request.owner_key).map_validation_err("owner_key")?;

    let record = owned_record(&state, id, &request.owner_key).await?;
    let RecordPayload::Bill(mut bill) = record.payload else {
        return Err(AppError::InvalidInput {
            field: "id".to_string(),
            reason: "record is not a bill".to_string(),
        });
    };

    bill.status = match bill.status {
        BillStatus::Paid => BillStatus::Unpaid,
        _ => BillStatus::Paid,
    };
    let status = bill.status.to_string();

    let store = state.store.clone();
    let updated = run_blocking(move || store.update_by_id(id, RecordPayload::Bill(bill))).await?;
    if !updated {
        return Err(AppError::RecordNotFound(id.to_string()));
    }

    info!(record_id = %id, status = %status, "bill status toggled");
    Ok(Json(ToggleBillResponse {
        id: id.to_string(),
        status,
    }))
}

/// Clear the reminder opt-in on every bill carrying `email`. Looked up by
/// contact email so it works across sessions (the link lives in the email
/// itself).
async fn unsubscribe_email(state: &AppState, email: String) -> Result<UnsubscribeResponse> {
    validation::validate_email(&email).map_validation_err("email")?;

    let store = state.store.clone();
    let target = email.clone();
    let updated = run_blocking(move || {
        let records = store.filter_by_email(&target)?;
        let mut updated = 0usize;
        for record in records {
            let RecordPayload::Bill(mut bill) = record.payload else {
                continue;
            };
            if !bill.send_email {
                continue;
            }
            bill.send_email = false;
            if store.update_by_id(record.id, RecordPayload::Bill(bill))? {
                updated += 1;
            }
        }
        Ok(updated)
    })
    .await?;

    info!(email = %email, updated, "unsubscribed from bill reminders");
    Ok(UnsubscribeResponse { email, updated })
}

/// POST /api/bills/unsubscribe
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(request): Json<UnsubscribeRequest>,
) -> Result<Json<UnsubscribeResponse>> {
    Ok(Json(unsubscribe_email(&state, request.email).await?))
}

/// GET /api/bills/unsubscribe?email= - the variant linked from reminder
/// emails
pub async fn unsubscribe_link(
    State(state): State<AppState>,
    Query(request): Query<UnsubscribeRequest>,
) -> Result<Json<UnsubscribeResponse>> {
    Ok(Json(unsubscribe_email(&state, request.email).await?))
}
