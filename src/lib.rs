//! FinHub library
//!
//! Multi-tenant personal finance service: budgets, bills, net worth,
//! emergency funds, financial health scoring, and quizzes, with email
//! reminders.
//!
//! # Architecture
//! - Record store abstraction with interchangeable backends (atomic JSON
//!   file, embedded document database)
//! - Notification dispatcher with two-tier provider fallback (HTTP API,
//!   then SMTP) and per-provider retry
//! - Background job runner for overdue sweeps and aggregated bill
//!   reminders
//! - Multi-step form flows staging drafts in a TTL cache

pub mod config;
pub mod drafts;
pub mod errors;
pub mod handlers;
pub mod notify;
pub mod records;
pub mod scheduler;
pub mod validation;

// Re-export dependencies to ensure tests use the same version
pub use chrono;
pub use parking_lot;
pub use uuid;
