//! Background job runner
//!
//! A fixed-interval loop (daily in production) driving two jobs against the
//! record store:
//!
//! 1. **Overdue sweep** - bills past their due date still marked pending or
//!    unpaid transition to overdue. Idempotent.
//! 2. **Reminder batch** - reminder-eligible bills are grouped by contact
//!    email and each address gets ONE aggregated notification, not one per
//!    bill.
//!
//! A failure in either job is logged and never stops the loop or delays the
//! next tick. The reminder batch records the date of its last completed run
//! in a marker file (atomic rename), so a process restart on the same day
//! does not double-send; a day whose batch failed is not replayed.

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::notify::{Dispatcher, NotificationRequest};
use crate::records::{BillStatus, RecordPayload, RecordStore, StoreResult};

const REMINDER_TEMPLATE_KEY: &str = "bill_reminder";
const MARKER_FILE: &str = "reminder_marker";

/// One bill line inside an aggregated reminder email
#[derive(Debug, Clone, Serialize)]
pub struct BillLine {
    pub bill_name: String,
    pub amount: f64,
    pub due_date: String,
    pub category: String,
    pub status: String,
}

/// All reminder-eligible bills for one email address
#[derive(Debug, Clone, Serialize)]
pub struct ReminderGroup {
    pub first_name: String,
    pub lang: String,
    pub bills: Vec<BillLine>,
}

/// Transition past-due pending/unpaid bills to overdue. Re-running on
/// already-overdue records is a no-op.
fn sweep_store(store: &dyn RecordStore, today: NaiveDate) -> StoreResult<usize> {
    let records = store.read_all()?;
    let mut transitioned = 0usize;

    for record in records {
        let RecordPayload::Bill(mut bill) = record.payload else {
            continue;
        };
        if bill.due_date < today && matches!(bill.status, BillStatus::Pending | BillStatus::Unpaid)
        {
            bill.status = BillStatus::Overdue;
            if store.update_by_id(record.id, RecordPayload::Bill(bill))? {
                transitioned += 1;
            }
        }
    }

    Ok(transitioned)
}

/// Group reminder-eligible bills by contact email. Eligible: opted in, has
/// an address, and either pending/overdue or due within the reminder
/// window.
fn collect_groups(
    store: &dyn RecordStore,
    today: NaiveDate,
    default_window: u32,
) -> StoreResult<BTreeMap<String, ReminderGroup>> {
    let records = store.read_all()?;
    let mut groups: BTreeMap<String, ReminderGroup> = BTreeMap::new();

    for record in records {
        let Some(bill) = record.as_bill() else {
            continue;
        };
        if !bill.send_email {
            continue;
        }
        let Some(email) = record.contact_email.as_deref() else {
            continue;
        };

        let window = bill.reminder_days.unwrap_or(default_window);
        let window_end = today + ChronoDuration::days(i64::from(window));
        let in_window = bill.due_date >= today && bill.due_date <= window_end;
        let eligible =
            matches!(bill.status, BillStatus::Pending | BillStatus::Overdue) || in_window;
        if !eligible {
            continue;
        }

        let group = groups.entry(email.to_string()).or_insert_with(|| ReminderGroup {
            first_name: bill
                .first_name
                .clone()
                .unwrap_or_else(|| "User".to_string()),
            lang: record.lang.clone().unwrap_or_else(|| "en".to_string()),
            bills: Vec::new(),
        });
        group.bills.push(BillLine {
            bill_name: bill.bill_name.clone(),
            amount: bill.amount,
            due_date: bill.due_date.format("%Y-%m-%d").to_string(),
            category: bill.category.clone(),
            status: bill.status.to_string(),
        });
    }

    Ok(groups)
}

pub struct JobRunner {
    store: Arc<dyn RecordStore>,
    dispatcher: Arc<Dispatcher>,
    reminder_days_default: u32,
    public_base_url: String,
    marker_path: PathBuf,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn RecordStore>,
        dispatcher: Arc<Dispatcher>,
        reminder_days_default: u32,
        public_base_url: String,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            dispatcher,
            reminder_days_default,
            public_base_url,
            marker_path: data_dir.join(MARKER_FILE),
        }
    }

    /// Start the interval loop. The first run happens one interval after
    /// startup; `shutdown` stops the loop at the next await point.
    pub fn spawn(
        self: Arc<Self>,
        interval_secs: u64,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // tokio intervals complete their first tick immediately;
            // consume it so the first real run lands one interval out.
            ticker.tick().await;

            info!(interval_secs, "job runner started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_tick().await;
                    }
                    _ = shutdown.changed() => {
                        info!("job runner stopping");
                        break;
                    }
                }
            }
        })
    }

    /// One scheduled tick: sweep, then remind. Each job's failure is
    /// contained here.
    pub async fn run_tick(&self) {
        let today = Utc::now().date_naive();

        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || sweep_store(store.as_ref(), today)).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!(count, "overdue sweep transitioned bills");
                }
            }
            Ok(Err(e)) => error!(error = %e, "overdue sweep failed"),
            Err(e) => error!(error = %e, "overdue sweep task panicked"),
        }

        match self.reminder_batch(today).await {
            Ok(sent) => {
                if sent > 0 {
                    info!(sent, "reminder batch dispatched");
                }
            }
            Err(e) => error!(error = %e, "reminder batch failed"),
        }
    }

    /// Synchronous sweep entry point (used by the tick and by tests that
    /// pin the date).
    pub fn overdue_sweep(&self, today: NaiveDate) -> StoreResult<usize> {
        sweep_store(self.store.as_ref(), today)
    }

    /// Send one aggregated reminder per email address. Returns the number
    /// of addresses actually notified.
    pub async fn reminder_batch(&self, today: NaiveDate) -> anyhow::Result<usize> {
        if self.last_batch_date() == Some(today) {
            debug!(%today, "reminder batch already ran today, skipping");
            return Ok(0);
        }

        let store = self.store.clone();
        let default_window = self.reminder_days_default;
        let groups = tokio::task::spawn_blocking(move || {
            collect_groups(store.as_ref(), today, default_window)
        })
        .await
        .map_err(|e| anyhow::anyhow!("reminder collection task panicked: {e}"))??;

        let mut sent = 0usize;
        for (email, group) in &groups {
            let request = NotificationRequest {
                to_address: email.clone(),
                subject: Dispatcher::default_subject(REMINDER_TEMPLATE_KEY)
                    .unwrap_or("Bill Payment Reminder")
                    .to_string(),
                template_key: REMINDER_TEMPLATE_KEY.to_string(),
                payload: serde_json::json!({
                    "first_name": group.first_name,
                    "bills": group.bills,
                    "cta_url": format!("{}/api/bill/dashboard", self.public_base_url),
                    "unsubscribe_url": format!(
                        "{}/api/bills/unsubscribe?email={email}",
                        self.public_base_url
                    ),
                }),
                lang: group.lang.clone(),
            };

            match self.dispatcher.send(&request).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    // One bad address must not sink the rest of the batch.
                    error!(to = %email, error = %e, "reminder delivery failed");
                }
            }
        }

        if let Err(e) = self.write_batch_marker(today) {
            warn!(error = %e, "could not persist reminder batch marker");
        }

        Ok(sent)
    }

    /// Date of the last completed reminder batch, if any.
    pub fn last_batch_date(&self) -> Option<NaiveDate> {
        let raw = fs::read_to_string(&self.marker_path).ok()?;
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
    }

    /// Atomic marker write: same temp-then-rename pattern as the JSON
    /// store, so a crash never leaves a torn marker.
    fn write_batch_marker(&self, date: NaiveDate) -> std::io::Result<()> {
        if let Some(dir) = self.marker_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.marker_path.with_extension("tmp");
        fs::write(&tmp, format!("{}\n", date.format("%Y-%m-%d")))?;
        fs::rename(&tmp, &self.marker_path)
    }
}
