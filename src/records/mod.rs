//! Record storage
//!
//! One trait, one contract, two backends. Historically this system shipped
//! with several storage layers that disagreed on missing-id behavior; the
//! contract here is fixed:
//!
//! - `update_by_id` / `delete_by_id` return `Ok(false)` for an unknown id.
//!   They never error on a miss and never create a record.
//! - `append` fails with [`StoreError::Unwritable`] when the backing medium
//!   rejects the write.
//! - The store never validates payload shape; that is the calling flow's
//!   job.

pub mod document;
pub mod json_file;
pub mod types;

pub use document::DocumentStore;
pub use json_file::JsonFileStore;
pub use types::{
    Bill, BillStatus, Budget, EmergencyFund, FinancialHealth, NetWorth, QuizResult, Record,
    RecordId, RecordKind, RecordPayload,
};

use std::fmt;

/// Storage failure, kept deliberately small: callers only distinguish
/// "the medium refused the write" from everything else.
#[derive(Debug)]
pub enum StoreError {
    /// The backing file or database cannot be written
    Unwritable(String),
    /// Backend-specific read/iteration failure
    Backend(String),
    /// A stored value could not be encoded or decoded
    Serialization(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unwritable(msg) => write!(f, "storage medium not writable: {msg}"),
            Self::Backend(msg) => write!(f, "storage backend error: {msg}"),
            Self::Serialization(msg) => write!(f, "storage serialization error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Backend-agnostic record store.
///
/// Implementations are synchronous; async callers wrap calls in
/// `spawn_blocking`.
pub trait RecordStore: Send + Sync {
    /// Create a record and return its generated id.
    fn append(
        &self,
        payload: RecordPayload,
        owner_key: &str,
        contact_email: Option<&str>,
        lang: Option<&str>,
    ) -> StoreResult<RecordId>;

    /// Every record in the store. O(n); there is no index beyond the
    /// backend's native key.
    fn read_all(&self) -> StoreResult<Vec<Record>>;

    /// Records created under the given owner key.
    fn filter_by_owner(&self, owner_key: &str) -> StoreResult<Vec<Record>>;

    /// Cross-session lookup by denormalized contact email.
    fn filter_by_email(&self, email: &str) -> StoreResult<Vec<Record>>;

    fn get_by_id(&self, id: RecordId) -> StoreResult<Option<Record>>;

    /// Replace the payload of an existing record. `Ok(false)` when the id
    /// is unknown; the envelope (owner, timestamps, email) is untouched.
    fn update_by_id(&self, id: RecordId, payload: RecordPayload) -> StoreResult<bool>;

    /// Idempotent delete. `Ok(false)` when the id was already absent.
    fn delete_by_id(&self, id: RecordId) -> StoreResult<bool>;

    /// Cheap reachability probe for the readiness endpoint.
    fn is_writable(&self) -> bool;

    /// Persist any buffered state. Called on graceful shutdown.
    fn flush(&self) -> StoreResult<()>;

    /// Human-readable backend name for health reporting.
    fn backend_name(&self) -> &'static str;
}
