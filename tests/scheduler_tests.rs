//! Scheduler job tests: overdue sweep and reminder batching
//!
//! Run with: cargo test --test scheduler_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tempfile::TempDir;

use finhub::notify::{
    Channel, Dispatcher, MailProvider, OutboundEmail, ProviderError, RetryPolicy,
};
use finhub::records::{Bill, BillStatus, JsonFileStore, RecordPayload, RecordStore};
use finhub::scheduler::JobRunner;

// ============================================================================
// TEST INFRASTRUCTURE
// ============================================================================

/// Always-succeeding provider that captures every delivered email.
struct CaptureProvider {
    calls: AtomicUsize,
    delivered: Mutex<Vec<OutboundEmail>>,
}

impl CaptureProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        })
    }

    fn deliveries(&self) -> Vec<OutboundEmail> {
        self.delivered.lock().clone()
    }
}

impl MailProvider for Arc<CaptureProvider> {
    fn name(&self) -> &'static str {
        "capture"
    }

    fn channel(&self) -> Channel {
        Channel::Api
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn deliver<'a>(
        &'a self,
        email: &'a OutboundEmail,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.delivered.lock().push(email.clone());
            Ok(())
        })
    }
}

struct Harness {
    store: Arc<JsonFileStore>,
    runner: Arc<JobRunner>,
    provider: Arc<CaptureProvider>,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let store = Arc::new(JsonFileStore::open(dir.path().join("records.json")).unwrap());
        let provider = CaptureProvider::new();
        let dispatcher = Arc::new(
            Dispatcher::new(vec![Box::new(provider.clone())]).with_policy(RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            }),
        );
        let runner = Arc::new(JobRunner::new(
            store.clone(),
            dispatcher,
            7,
            "http://localhost:8080".to_string(),
            dir.path().to_path_buf(),
        ));
        Self {
            store,
            runner,
            provider,
            _dir: dir,
        }
    }

    fn seed_bill(
        &self,
        name: &str,
        due: NaiveDate,
        status: BillStatus,
        send_email: bool,
        email: Option<&str>,
    ) -> finhub::records::RecordId {
        self.store
            .append(
                RecordPayload::Bill(Bill {
                    bill_name: name.to_string(),
                    amount: 10_000.0,
                    due_date: due,
                    frequency: "monthly".to_string(),
                    category: "utilities".to_string(),
                    status,
                    send_email,
                    reminder_days: Some(7),
                    first_name: Some("Ada".to_string()),
                }),
                "s1",
                email,
                Some("en"),
            )
            .unwrap()
    }

    fn bill_status(&self, id: finhub::records::RecordId) -> BillStatus {
        self.store
            .get_by_id(id)
            .unwrap()
            .unwrap()
            .as_bill()
            .unwrap()
            .status
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// OVERDUE SWEEP
// ============================================================================

#[test]
fn sweep_transitions_past_due_unpaid_and_pending() {
    let h = Harness::new();
    let today = date(2025, 1, 2);

    let unpaid_past = h.seed_bill("Rent", date(2025, 1, 1), BillStatus::Unpaid, false, None);
    let pending_past = h.seed_bill("Power", date(2024, 12, 20), BillStatus::Pending, false, None);
    let paid_past = h.seed_bill("Water", date(2025, 1, 1), BillStatus::Paid, false, None);
    let unpaid_future = h.seed_bill("Internet", date(2025, 1, 10), BillStatus::Unpaid, false, None);
    let due_today = h.seed_bill("Phone", date(2025, 1, 2), BillStatus::Unpaid, false, None);

    let transitioned = h.runner.overdue_sweep(today).unwrap();
    assert_eq!(transitioned, 2);

    assert_eq!(h.bill_status(unpaid_past), BillStatus::Overdue);
    assert_eq!(h.bill_status(pending_past), BillStatus::Overdue);
    // Paid stays paid even past due.
    assert_eq!(h.bill_status(paid_past), BillStatus::Paid);
    // Not yet due: untouched.
    assert_eq!(h.bill_status(unpaid_future), BillStatus::Unpaid);
    assert_eq!(h.bill_status(due_today), BillStatus::Unpaid);
}

#[test]
fn sweep_is_idempotent() {
    let h = Harness::new();
    let today = date(2025, 1, 2);
    let id = h.seed_bill("Rent", date(2025, 1, 1), BillStatus::Unpaid, false, None);

    assert_eq!(h.runner.overdue_sweep(today).unwrap(), 1);
    assert_eq!(h.runner.overdue_sweep(today).unwrap(), 0);
    assert_eq!(h.bill_status(id), BillStatus::Overdue);
}

#[test]
fn sweep_ignores_non_bill_records() {
    let h = Harness::new();
    h.store
        .append(
            RecordPayload::QuizResult(finhub::records::QuizResult {
                first_name: None,
                personality: "Planner".to_string(),
                score: 9,
                badges: vec![],
                insights: vec![],
                tips: vec![],
                send_email: false,
            }),
            "s1",
            None,
            None,
        )
        .unwrap();

    assert_eq!(h.runner.overdue_sweep(date(2025, 1, 2)).unwrap(), 0);
}

// ============================================================================
// REMINDER BATCH
// ============================================================================

#[tokio::test]
async fn two_bills_same_email_produce_one_aggregated_reminder() {
    let h = Harness::new();
    let today = date(2025, 1, 2);

    h.seed_bill(
        "Rent",
        date(2025, 1, 5),
        BillStatus::Unpaid,
        true,
        Some("ada@example.com"),
    );
    h.seed_bill(
        "Power",
        date(2025, 1, 8),
        BillStatus::Unpaid,
        true,
        Some("ada@example.com"),
    );

    let sent = h.runner.reminder_batch(today).await.unwrap();
    assert_eq!(sent, 1);

    let deliveries = h.provider.deliveries();
    assert_eq!(deliveries.len(), 1, "one email per address, not per bill");
    assert_eq!(deliveries[0].to, "ada@example.com");
    assert!(deliveries[0].html.contains("Rent"));
    assert!(deliveries[0].html.contains("Power"));
}

#[tokio::test]
async fn distinct_emails_each_get_their_own_reminder() {
    let h = Harness::new();
    let today = date(2025, 1, 2);

    h.seed_bill(
        "Rent",
        date(2025, 1, 5),
        BillStatus::Unpaid,
        true,
        Some("ada@example.com"),
    );
    h.seed_bill(
        "Power",
        date(2025, 1, 5),
        BillStatus::Unpaid,
        true,
        Some("grace@example.com"),
    );

    let sent = h.runner.reminder_batch(today).await.unwrap();
    assert_eq!(sent, 2);
    assert_eq!(h.provider.deliveries().len(), 2);
}

#[tokio::test]
async fn ineligible_bills_are_excluded() {
    let h = Harness::new();
    let today = date(2025, 1, 2);

    // Outside the 7-day window and neither pending nor overdue.
    h.seed_bill(
        "FarFuture",
        date(2025, 3, 1),
        BillStatus::Unpaid,
        true,
        Some("ada@example.com"),
    );
    // Not opted in.
    h.seed_bill(
        "Quiet",
        date(2025, 1, 3),
        BillStatus::Unpaid,
        false,
        Some("ada@example.com"),
    );
    // Opted in but no address to send to.
    h.seed_bill("NoEmail", date(2025, 1, 3), BillStatus::Unpaid, true, None);

    let sent = h.runner.reminder_batch(today).await.unwrap();
    assert_eq!(sent, 0);
    assert!(h.provider.deliveries().is_empty());
}

#[tokio::test]
async fn overdue_bills_remind_even_outside_the_window() {
    let h = Harness::new();
    let today = date(2025, 1, 2);

    h.seed_bill(
        "OldDebt",
        date(2024, 11, 1),
        BillStatus::Overdue,
        true,
        Some("ada@example.com"),
    );

    let sent = h.runner.reminder_batch(today).await.unwrap();
    assert_eq!(sent, 1);
    assert!(h.provider.deliveries()[0].html.contains("OldDebt"));
}

#[tokio::test]
async fn batch_runs_at_most_once_per_day() {
    let h = Harness::new();
    let today = date(2025, 1, 2);

    h.seed_bill(
        "Rent",
        date(2025, 1, 5),
        BillStatus::Unpaid,
        true,
        Some("ada@example.com"),
    );

    assert_eq!(h.runner.reminder_batch(today).await.unwrap(), 1);
    // Same-day rerun (e.g. process restart): skipped via the marker file.
    assert_eq!(h.runner.reminder_batch(today).await.unwrap(), 0);
    assert_eq!(h.provider.deliveries().len(), 1);

    // Next day runs again.
    assert_eq!(h.runner.reminder_batch(date(2025, 1, 3)).await.unwrap(), 1);
}

#[tokio::test]
async fn sweep_then_batch_reports_overdue_status_in_the_email() {
    let h = Harness::new();
    let today = date(2025, 1, 2);

    h.seed_bill(
        "Rent",
        date(2025, 1, 1),
        BillStatus::Unpaid,
        true,
        Some("ada@example.com"),
    );

    h.runner.overdue_sweep(today).unwrap();
    let sent = h.runner.reminder_batch(today).await.unwrap();

    assert_eq!(sent, 1);
    let html = &h.provider.deliveries()[0].html;
    assert!(html.contains("overdue"));
}
