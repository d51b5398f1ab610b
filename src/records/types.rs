//! Record envelope and typed payloads
//!
//! Every persisted row is a [`Record`]: a small immutable envelope (id,
//! owner key, creation timestamp, optional contact email and language tag)
//! wrapping one [`RecordPayload`] variant. The envelope is what the store
//! indexes; the payload is domain data the store never inspects.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique record identifier (UUIDv4, assigned on append)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Persisted envelope wrapping one domain payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Session id (anonymous) or user id (authenticated). Assigned at
    /// creation and never transferred.
    pub owner_key: String,
    pub created_at: DateTime<Utc>,
    /// Denormalized address for notification targeting and cross-session
    /// lookup when the owning session is gone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    pub payload: RecordPayload,
}

impl Record {
    /// Bill payload accessor; `None` for every other kind.
    pub fn as_bill(&self) -> Option<&Bill> {
        match &self.payload {
            RecordPayload::Bill(b) => Some(b),
            _ => None,
        }
    }
}

/// Domain discriminant for dashboards and flow routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Bill,
    Budget,
    NetWorth,
    EmergencyFund,
    FinancialHealth,
    QuizResult,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bill => "bill",
            Self::Budget => "budget",
            Self::NetWorth => "net_worth",
            Self::EmergencyFund => "emergency_fund",
            Self::FinancialHealth => "financial_health",
            Self::QuizResult => "quiz_result",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed domain payloads, one variant per flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    Bill(Bill),
    Budget(Budget),
    NetWorth(NetWorth),
    EmergencyFund(EmergencyFund),
    FinancialHealth(FinancialHealth),
    QuizResult(QuizResult),
}

impl RecordPayload {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Bill(_) => RecordKind::Bill,
            Self::Budget(_) => RecordKind::Budget,
            Self::NetWorth(_) => RecordKind::NetWorth,
            Self::EmergencyFund(_) => RecordKind::EmergencyFund,
            Self::FinancialHealth(_) => RecordKind::FinancialHealth,
            Self::QuizResult(_) => RecordKind::QuizResult,
        }
    }
}

/// Bill lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Pending,
    Paid,
    Unpaid,
    Overdue,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
            Self::Overdue => "overdue",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub bill_name: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub frequency: String,
    pub category: String,
    pub status: BillStatus,
    /// Reminder opt-in; cleared by the unsubscribe endpoint.
    pub send_email: bool,
    /// Days before due date during which the bill is reminder-eligible.
    /// Falls back to the server default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub income: f64,
    pub fixed_expenses: f64,
    pub variable_expenses: f64,
    pub savings_goal: f64,
    pub surplus_deficit: f64,
    pub housing: f64,
    pub food: f64,
    pub transport: f64,
    pub dependents: f64,
    pub miscellaneous: f64,
    pub others: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default)]
    pub send_email: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetWorth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    pub cash_savings: f64,
    pub investments: f64,
    pub property: f64,
    pub loans: f64,
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub net_worth: f64,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub send_email: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyFund {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    pub monthly_expenses: f64,
    pub monthly_income: f64,
    pub current_savings: f64,
    pub risk_tolerance_level: String,
    pub dependents: u32,
    /// Months the user wants to reach the target in
    pub timeline: u32,
    pub recommended_months: u32,
    pub target_amount: f64,
    pub savings_gap: f64,
    pub monthly_savings: f64,
    pub percent_of_income: f64,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub email_opt_in: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialHealth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    pub income: f64,
    pub expenses: f64,
    pub debt: f64,
    pub interest_rate: f64,
    pub debt_to_income: f64,
    pub savings_rate: f64,
    pub interest_burden: f64,
    pub score: f64,
    pub status: String,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub send_email: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    pub personality: String,
    pub score: u32,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default)]
    pub send_email: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bill() -> RecordPayload {
        RecordPayload::Bill(Bill {
            bill_name: "Rent".to_string(),
            amount: 50_000.0,
            due_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            frequency: "monthly".to_string(),
            category: "housing".to_string(),
            status: BillStatus::Unpaid,
            send_email: true,
            reminder_days: Some(7),
            first_name: Some("Ada".to_string()),
        })
    }

    #[test]
    fn payload_kind_matches_variant() {
        assert_eq!(sample_bill().kind(), RecordKind::Bill);
        assert_eq!(RecordKind::Bill.as_str(), "bill");
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = Record {
            id: RecordId::generate(),
            owner_key: "session-1".to_string(),
            created_at: Utc::now(),
            contact_email: Some("ada@example.com".to_string()),
            lang: Some("en".to_string()),
            payload: sample_bill(),
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.owner_key, "session-1");
        let bill = back.as_bill().expect("bill payload");
        assert_eq!(bill.bill_name, "Rent");
        assert_eq!(bill.status, BillStatus::Unpaid);
    }

    #[test]
    fn payload_tag_is_snake_case() {
        let json = serde_json::to_value(sample_bill()).unwrap();
        assert_eq!(json["kind"], "bill");
        assert_eq!(json["status"], "unpaid");
    }
}
