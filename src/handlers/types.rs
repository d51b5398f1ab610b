//! Shared request/response types for the HTTP API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::records::{Record, RecordPayload};

/// Body for a flow step submission
#[derive(Debug, Deserialize)]
pub struct FlowStepRequest {
    pub owner_key: String,
    /// This step's field values
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct FlowStepResponse {
    pub flow: String,
    pub step: u32,
    pub steps_total: u32,
    /// True once the final step materialized a record
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Whether a summary notification was delivered for the final step
    pub email_sent: bool,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner_key: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub flow: String,
    pub records: Vec<Record>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest {
    pub owner_key: String,
    pub payload: RecordPayload,
}

#[derive(Debug, Serialize)]
pub struct UpdateRecordResponse {
    pub id: String,
    pub updated: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteRecordResponse {
    pub id: String,
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct ToggleBillRequest {
    pub owner_key: String,
}

#[derive(Debug, Serialize)]
pub struct ToggleBillResponse {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub email: String,
    /// Number of bill records whose reminder opt-in was cleared
    pub updated: usize,
}
