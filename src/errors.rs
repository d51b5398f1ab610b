//! Application error types
//!
//! One structured error enum at the HTTP boundary with machine-readable
//! codes; internal modules use their own small error types (or `anyhow`)
//! and convert at the edge.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::notify::DispatchError;
use crate::records::StoreError;

/// Structured error response for API clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
pub enum AppError {
    // Validation errors (400)
    InvalidInput { field: String, reason: String },
    InvalidOwnerKey(String),
    InvalidRecordId(String),

    // Not found (404)
    RecordNotFound(String),
    DraftNotFound { flow: String },

    // Internal errors (500)
    StorageWrite(String),
    Storage(String),
    Serialization(String),

    // Delivery exhausted (502)
    Delivery(String),

    // Service errors (503)
    ServiceUnavailable(String),

    // Generic wrapper for external errors
    Internal(anyhow::Error),
}

impl AppError {
    /// Error code for client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::InvalidOwnerKey(_) => "INVALID_OWNER_KEY",
            Self::InvalidRecordId(_) => "INVALID_RECORD_ID",
            Self::RecordNotFound(_) => "RECORD_NOT_FOUND",
            Self::DraftNotFound { .. } => "DRAFT_NOT_FOUND",
            Self::StorageWrite(_) => "STORAGE_WRITE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Delivery(_) => "DELIVERY_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } | Self::InvalidOwnerKey(_) | Self::InvalidRecordId(_) => {
                StatusCode::BAD_REQUEST
            }

            Self::RecordNotFound(_) | Self::DraftNotFound { .. } => StatusCode::NOT_FOUND,

            Self::StorageWrite(_)
            | Self::Storage(_)
            | Self::Serialization(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,

            Self::Delivery(_) => StatusCode::BAD_GATEWAY,

            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::InvalidInput { field, reason } => {
                format!("Invalid input for field '{field}': {reason}")
            }
            Self::InvalidOwnerKey(msg) => format!("Invalid owner key: {msg}"),
            Self::InvalidRecordId(msg) => format!("Invalid record id: {msg}"),
            Self::RecordNotFound(id) => format!("Record not found: {id}"),
            Self::DraftNotFound { flow } => {
                format!("No draft in progress for flow '{flow}' (it may have expired)")
            }
            Self::StorageWrite(msg) => format!("Storage write error: {msg}"),
            Self::Storage(msg) => format!("Storage error: {msg}"),
            Self::Serialization(msg) => format!("Serialization error: {msg}"),
            Self::Delivery(msg) => format!("Notification delivery failed: {msg}"),
            Self::ServiceUnavailable(msg) => format!("Service unavailable: {msg}"),
            Self::Internal(err) => format!("Internal error: {err}"),
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.message(),
            details: None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unwritable(msg) => Self::StorageWrite(msg),
            StoreError::Backend(msg) => Self::Storage(msg),
            StoreError::Serialization(msg) => Self::Serialization(msg),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnknownTemplate(key) => Self::InvalidInput {
                field: "template_key".to_string(),
                reason: format!("unknown template key '{key}'"),
            },
            DispatchError::Delivery(e) => Self::Delivery(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_response();

        (status, Json(body)).into_response()
    }
}

/// Helper trait to convert validation errors at the handler boundary
pub trait ValidationErrorExt<T> {
    fn map_validation_err(self, field: &str) -> Result<T>;
}

impl<T> ValidationErrorExt<T> for anyhow::Result<T> {
    fn map_validation_err(self, field: &str) -> Result<T> {
        self.map_err(|e| AppError::InvalidInput {
            field: field.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;
