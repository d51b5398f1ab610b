//! Multi-step form flows
//!
//! Each flow collects fields across several POST round-trips, staging them
//! in the draft store. Nothing is durable until the final step, which
//! validates the accumulated fields, derives the computed figures, appends
//! the record, and (when the user opted in with an address) dispatches the
//! flow's summary email. A delivery failure is logged and reported in the
//! response - it never fails the flow itself.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use tracing::{info, warn};

use super::state::AppState;
use super::types::{FlowStepRequest, FlowStepResponse, OwnerQuery};
use super::utils::run_blocking;
use crate::drafts::{FlowDraft, FlowKind};
use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::notify::NotificationRequest;
use crate::records::{
    Bill, BillStatus, Budget, EmergencyFund, FinancialHealth, NetWorth, QuizResult, RecordPayload,
};
use crate::validation;

const QUIZ_QUESTIONS: usize = 10;

// ============================================================================
// FIELD EXTRACTION
// ============================================================================

/// Numeric field: accepts a JSON number or a string with thousands commas
/// ("50,000"), the way the original web forms submit amounts.
fn get_f64(fields: &Map<String, Value>, name: &str) -> anyhow::Result<f64> {
    let value = fields
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("missing field '{name}'"))?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse::<f64>().ok(),
        _ => None,
    };
    let amount = parsed.ok_or_else(|| anyhow::anyhow!("field '{name}' must be a number"))?;
    validation::validate_amount(name, amount)?;
    Ok(amount)
}

fn get_u32(fields: &Map<String, Value>, name: &str) -> anyhow::Result<u32> {
    let value = fields
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("missing field '{name}'"))?;
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| anyhow::anyhow!("field '{name}' must be a non-negative integer"))
}

fn get_str<'a>(fields: &'a Map<String, Value>, name: &str) -> anyhow::Result<&'a str> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing field '{name}'"))
}

fn opt_str(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn get_bool(fields: &Map<String, Value>, name: &str) -> bool {
    match fields.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "yes" | "on" | "1"),
        _ => false,
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

// ============================================================================
// PER-STEP VALIDATION
// ============================================================================

/// Validate just the fields this step is responsible for; presence of the
/// full set is re-checked at finalize time.
fn validate_step_fields(
    kind: FlowKind,
    step: u32,
    fields: &Map<String, Value>,
) -> anyhow::Result<()> {
    if let Some(name) = fields.get("first_name").and_then(Value::as_str) {
        validation::validate_name(name)?;
    }
    if let Some(email) = fields.get("email").and_then(Value::as_str) {
        validation::validate_email(email)?;
    }

    match (kind, step) {
        (FlowKind::Budget, 2) => {
            get_f64(fields, "income")?;
        }
        (FlowKind::Budget, 3) => {
            for name in ["housing", "food", "transport", "dependents", "miscellaneous", "others"] {
                get_f64(fields, name)?;
            }
        }
        (FlowKind::Budget, 4) => {
            get_f64(fields, "savings_goal")?;
        }
        (FlowKind::Bill, 2) => {
            validation::validate_name(get_str(fields, "bill_name")?)?;
            get_f64(fields, "amount")?;
            let due = validation::validate_due_date(get_str(fields, "due_date")?)?;
            if due < Utc::now().date_naive() {
                anyhow::bail!("due_date cannot be in the past");
            }
            let frequency = get_str(fields, "frequency")?;
            if !matches!(frequency, "one-time" | "weekly" | "monthly" | "quarterly") {
                anyhow::bail!("frequency must be one of: one-time, weekly, monthly, quarterly");
            }
            validation::validate_name(get_str(fields, "category")?)?;
            if let Some(status) = fields.get("status").and_then(Value::as_str) {
                if !matches!(status, "pending" | "paid" | "unpaid") {
                    anyhow::bail!("status must be one of: pending, paid, unpaid");
                }
            }
            if get_bool(fields, "send_email") {
                validation::validate_reminder_days(get_u32(fields, "reminder_days")?)?;
            }
        }
        (FlowKind::NetWorth, 2) => {
            for name in ["cash_savings", "investments", "property", "loans"] {
                get_f64(fields, name)?;
            }
        }
        (FlowKind::EmergencyFund, 2) => {
            for name in ["monthly_expenses", "monthly_income", "current_savings"] {
                get_f64(fields, name)?;
            }
            let risk = get_str(fields, "risk_tolerance_level")?;
            if !matches!(risk, "low" | "medium" | "high") {
                anyhow::bail!("risk_tolerance_level must be one of: low, medium, high");
            }
            get_u32(fields, "dependents")?;
            let timeline = get_u32(fields, "timeline")?;
            if timeline == 0 || timeline > 60 {
                anyhow::bail!("timeline must be between 1 and 60 months");
            }
        }
        (FlowKind::FinancialHealth, 2) => {
            get_f64(fields, "income")?;
            get_f64(fields, "expenses")?;
        }
        (FlowKind::FinancialHealth, 3) => {
            get_f64(fields, "debt")?;
            let rate = get_f64(fields, "interest_rate")?;
            if rate > 100.0 {
                anyhow::bail!("interest_rate must be a percentage between 0 and 100");
            }
        }
        (FlowKind::Quiz, 2) => {
            let answers = fields
                .get("answers")
                .and_then(Value::as_array)
                .ok_or_else(|| anyhow::anyhow!("missing field 'answers'"))?;
            if answers.len() != QUIZ_QUESTIONS {
                anyhow::bail!("answers must contain exactly {QUIZ_QUESTIONS} entries");
            }
        }
        // Step 1 everywhere is contact info, already checked above.
        _ => {}
    }
    Ok(())
}

// ============================================================================
// FINALIZERS
// ============================================================================

struct FlowOutcome {
    payload: RecordPayload,
    /// Template key + data for the summary email, when one should go out
    notification: Option<(&'static str, Value)>,
}

fn finalize_budget(fields: &Map<String, Value>) -> anyhow::Result<FlowOutcome> {
    let income = get_f64(fields, "income")?;
    let housing = get_f64(fields, "housing")?;
    let food = get_f64(fields, "food")?;
    let transport = get_f64(fields, "transport")?;
    let dependents = get_f64(fields, "dependents")?;
    let miscellaneous = get_f64(fields, "miscellaneous")?;
    let others = get_f64(fields, "others")?;
    let savings_goal = get_f64(fields, "savings_goal")?;

    let fixed_expenses = housing + food + transport + dependents;
    let variable_expenses = miscellaneous + others;
    let surplus_deficit = income - fixed_expenses - variable_expenses - savings_goal;

    let first_name = opt_str(fields, "first_name");
    let budget = Budget {
        income,
        fixed_expenses,
        variable_expenses,
        savings_goal,
        surplus_deficit,
        housing,
        food,
        transport,
        dependents,
        miscellaneous,
        others,
        first_name: first_name.clone(),
        send_email: get_bool(fields, "send_email"),
    };

    let data = json!({
        "first_name": first_name.unwrap_or_else(|| "User".to_string()),
        "income": income,
        "fixed_expenses": fixed_expenses,
        "variable_expenses": variable_expenses,
        "savings_goal": savings_goal,
        "surplus_deficit": surplus_deficit,
    });

    Ok(FlowOutcome {
        payload: RecordPayload::Budget(budget),
        notification: Some(("budget", data)),
    })
}

fn finalize_bill(fields: &Map<String, Value>) -> anyhow::Result<FlowOutcome> {
    let send_email = get_bool(fields, "send_email");
    let bill = Bill {
        bill_name: get_str(fields, "bill_name")?.to_string(),
        amount: get_f64(fields, "amount")?,
        due_date: validation::validate_due_date(get_str(fields, "due_date")?)?,
        frequency: get_str(fields, "frequency")?.to_string(),
        category: get_str(fields, "category")?.to_string(),
        status: match fields.get("status").and_then(Value::as_str) {
            Some("paid") => BillStatus::Paid,
            Some("pending") => BillStatus::Pending,
            _ => BillStatus::Unpaid,
        },
        send_email,
        reminder_days: if send_email {
            Some(get_u32(fields, "reminder_days")?)
        } else {
            None
        },
        first_name: opt_str(fields, "first_name"),
    };

    let data = json!({
        "first_name": bill.first_name.clone().unwrap_or_else(|| "User".to_string()),
        "bills": [{
            "bill_name": bill.bill_name,
            "amount": bill.amount,
            "due_date": bill.due_date.format("%Y-%m-%d").to_string(),
            "category": bill.category,
            "status": bill.status.to_string(),
        }],
    });

    Ok(FlowOutcome {
        payload: RecordPayload::Bill(bill),
        notification: Some(("bill_reminder", data)),
    })
}

fn finalize_net_worth(fields: &Map<String, Value>) -> anyhow::Result<FlowOutcome> {
    let cash_savings = get_f64(fields, "cash_savings")?;
    let investments = get_f64(fields, "investments")?;
    let property = get_f64(fields, "property")?;
    let loans = get_f64(fields, "loans")?;

    let total_assets = cash_savings + investments + property;
    let total_liabilities = loans;
    let net_worth = total_assets - total_liabilities;

    let mut badges = Vec::new();
    if net_worth > 0.0 {
        badges.push("Positive Net Worth".to_string());
    }
    if investments > 0.0 && investments >= cash_savings {
        badges.push("Investor".to_string());
    }
    if loans == 0.0 {
        badges.push("Debt Free".to_string());
    }

    let first_name = opt_str(fields, "first_name");
    let data = json!({
        "first_name": first_name.clone().unwrap_or_else(|| "User".to_string()),
        "total_assets": total_assets,
        "total_liabilities": total_liabilities,
        "net_worth": net_worth,
        "badges": badges,
    });

    Ok(FlowOutcome {
        payload: RecordPayload::NetWorth(NetWorth {
            first_name,
            cash_savings,
            investments,
            property,
            loans,
            total_assets,
            total_liabilities,
            net_worth,
            badges,
            send_email: get_bool(fields, "send_email"),
        }),
        notification: Some(("net_worth", data)),
    })
}

fn finalize_emergency_fund(fields: &Map<String, Value>) -> anyhow::Result<FlowOutcome> {
    let monthly_expenses = get_f64(fields, "monthly_expenses")?;
    let monthly_income = get_f64(fields, "monthly_income")?;
    let current_savings = get_f64(fields, "current_savings")?;
    let risk = get_str(fields, "risk_tolerance_level")?.to_string();
    let dependents = get_u32(fields, "dependents")?;
    let timeline = get_u32(fields, "timeline")?;

    // Cushion sizing: riskier situations and larger households need more
    // months of runway.
    let mut recommended_months = match risk.as_str() {
        "low" => 6,
        "medium" => 9,
        _ => 12,
    };
    if dependents >= 3 {
        recommended_months += 3;
    }

    let target_amount = monthly_expenses * f64::from(recommended_months);
    let savings_gap = (target_amount - current_savings).max(0.0);
    let monthly_savings = savings_gap / f64::from(timeline.max(1));
    let percent_of_income = if monthly_income > 0.0 {
        round1(monthly_savings / monthly_income * 100.0)
    } else {
        0.0
    };

    let mut badges = Vec::new();
    if current_savings >= target_amount && target_amount > 0.0 {
        badges.push("Fully Funded".to_string());
    } else if current_savings >= target_amount / 2.0 && target_amount > 0.0 {
        badges.push("Halfway There".to_string());
    }

    let first_name = opt_str(fields, "first_name");
    let data = json!({
        "first_name": first_name.clone().unwrap_or_else(|| "User".to_string()),
        "recommended_months": recommended_months,
        "target_amount": target_amount,
        "current_savings": current_savings,
        "savings_gap": savings_gap,
        "monthly_savings": round1(monthly_savings),
    });

    Ok(FlowOutcome {
        payload: RecordPayload::EmergencyFund(EmergencyFund {
            first_name,
            monthly_expenses,
            monthly_income,
            current_savings,
            risk_tolerance_level: risk,
            dependents,
            timeline,
            recommended_months,
            target_amount,
            savings_gap,
            monthly_savings,
            percent_of_income,
            badges,
            email_opt_in: get_bool(fields, "email_opt_in"),
        }),
        notification: Some(("emergency_fund", data)),
    })
}

fn finalize_financial_health(fields: &Map<String, Value>) -> anyhow::Result<FlowOutcome> {
    let income = get_f64(fields, "income")?;
    let expenses = get_f64(fields, "expenses")?;
    let debt = get_f64(fields, "debt")?;
    let interest_rate = get_f64(fields, "interest_rate")?;

    let debt_to_income = if income > 0.0 {
        round1(debt / income * 100.0)
    } else {
        0.0
    };
    let savings_rate = if income > 0.0 {
        round1((income - expenses) / income * 100.0)
    } else {
        0.0
    };
    let interest_burden = if income > 0.0 {
        round1(debt * interest_rate / 100.0 / income * 100.0)
    } else {
        0.0
    };

    let score = (100.0 - 0.4 * debt_to_income.min(100.0) - 0.3 * interest_burden.min(100.0)
        + 0.3 * savings_rate.clamp(0.0, 100.0))
    .clamp(0.0, 100.0);
    let score = round1(score);

    let status = if score >= 80.0 {
        "Excellent"
    } else if score >= 60.0 {
        "Good"
    } else if score >= 40.0 {
        "Fair"
    } else {
        "At Risk"
    }
    .to_string();

    let mut badges = Vec::new();
    if savings_rate >= 20.0 {
        badges.push("Strong Saver".to_string());
    }
    if debt == 0.0 {
        badges.push("Debt Free".to_string());
    }

    let first_name = opt_str(fields, "first_name");
    let data = json!({
        "first_name": first_name.clone().unwrap_or_else(|| "User".to_string()),
        "score": score,
        "status": status,
        "debt_to_income": debt_to_income,
        "savings_rate": savings_rate,
        "interest_burden": interest_burden,
        "badges": badges,
    });

    Ok(FlowOutcome {
        payload: RecordPayload::FinancialHealth(FinancialHealth {
            first_name,
            user_type: opt_str(fields, "user_type"),
            income,
            expenses,
            debt,
            interest_rate,
            debt_to_income,
            savings_rate,
            interest_burden,
            score,
            status,
            badges,
            send_email: get_bool(fields, "send_email"),
        }),
        notification: Some(("financial_health", data)),
    })
}

fn finalize_quiz(fields: &Map<String, Value>) -> anyhow::Result<FlowOutcome> {
    let answers = fields
        .get("answers")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("missing field 'answers'"))?;

    let score = answers
        .iter()
        .filter(|a| match a {
            Value::Bool(b) => *b,
            Value::String(s) => matches!(s.as_str(), "yes" | "true"),
            _ => false,
        })
        .count() as u32;

    let (personality, insights, tips) = if score >= 8 {
        (
            "Planner",
            vec!["You track where your money goes and it shows.".to_string()],
            vec!["Consider automating your investments next.".to_string()],
        )
    } else if score >= 5 {
        (
            "Saver",
            vec!["You have solid saving instincts.".to_string()],
            vec!["A written monthly budget would sharpen your edge.".to_string()],
        )
    } else if score >= 3 {
        (
            "Balanced",
            vec!["You balance spending and saving, but without a system.".to_string()],
            vec![
                "Start with a simple budget to find easy wins.".to_string(),
                "Set up an emergency fund target.".to_string(),
            ],
        )
    } else {
        (
            "Spender",
            vec!["Most of your money is spoken for before month end.".to_string()],
            vec![
                "Track every expense for one month.".to_string(),
                "Pick one recurring cost to cut this week.".to_string(),
            ],
        )
    };

    let badges = if score >= 8 {
        vec!["Quiz Master".to_string()]
    } else {
        Vec::new()
    };

    let first_name = opt_str(fields, "first_name");
    let data = json!({
        "first_name": first_name.clone().unwrap_or_else(|| "User".to_string()),
        "score": score,
        "personality": personality,
        "insights": insights,
        "tips": tips,
    });

    Ok(FlowOutcome {
        payload: RecordPayload::QuizResult(QuizResult {
            first_name,
            personality: personality.to_string(),
            score,
            badges,
            insights,
            tips,
            send_email: get_bool(fields, "send_email"),
        }),
        notification: Some(("quiz", data)),
    })
}

fn finalize(kind: FlowKind, fields: &Map<String, Value>) -> anyhow::Result<FlowOutcome> {
    match kind {
        FlowKind::Budget => finalize_budget(fields),
        FlowKind::Bill => finalize_bill(fields),
        FlowKind::NetWorth => finalize_net_worth(fields),
        FlowKind::EmergencyFund => finalize_emergency_fund(fields),
        FlowKind::FinancialHealth => finalize_financial_health(fields),
        FlowKind::Quiz => finalize_quiz(fields),
    }
}

/// Whether the user asked for the summary email in this flow
fn wants_email(kind: FlowKind, fields: &Map<String, Value>) -> bool {
    match kind {
        FlowKind::EmergencyFund => get_bool(fields, "email_opt_in"),
        _ => get_bool(fields, "send_email"),
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

fn parse_flow(flow: &str) -> Result<FlowKind> {
    FlowKind::from_str(flow).map_err(|reason| AppError::InvalidInput {
        field: "flow".to_string(),
        reason,
    })
}

/// POST /api/flows/{flow}/step/{step}
pub async fn submit_step(
    State(state): State<AppState>,
    Path((flow, step)): Path<(String, u32)>,
    Json(request): Json<FlowStepRequest>,
) -> Result<Json<FlowStepResponse>> {
    let kind = parse_flow(&flow)?;
    validation::validate_owner_key(&request.owner_key).map_validation_err("owner_key")?;
    validate_step_fields(kind, step, &request.fields).map_validation_err("fields")?;

    let draft = state
        .drafts
        .merge_step(&request.owner_key, kind, step, request.fields)
        .map_err(|e| AppError::InvalidInput {
            field: "step".to_string(),
            reason: e.to_string(),
        })?;

    if step < kind.steps_total() {
        return Ok(Json(FlowStepResponse {
            flow: kind.as_str().to_string(),
            step,
            steps_total: kind.steps_total(),
            completed: false,
            record_id: None,
            email_sent: false,
        }));
    }

    // Final step: materialize the record.
    let outcome = finalize(kind, &draft.fields).map_validation_err("fields")?;
    let contact_email = opt_str(&draft.fields, "email");
    let lang = validation::normalize_lang(draft.fields.get("lang").and_then(Value::as_str));

    let store = state.store.clone();
    let owner_key = request.owner_key.clone();
    let payload = outcome.payload;
    let email_for_store = contact_email.clone();
    let lang_for_store = lang.to_string();
    let record_id = run_blocking(move || {
        store.append(
            payload,
            &owner_key,
            email_for_store.as_deref(),
            Some(&lang_for_store),
        )
    })
    .await?;

    state.drafts.take(&request.owner_key, kind);
    info!(flow = kind.as_str(), record_id = %record_id, "flow completed");

    // Summary email is best-effort: a delivery failure is reported in the
    // response but never fails the flow.
    let mut email_sent = false;
    if wants_email(kind, &draft.fields) {
        if let (Some(email), Some((template_key, mut data))) = (contact_email, outcome.notification)
        {
            let base = &state.config.public_base_url;
            if let Some(object) = data.as_object_mut() {
                object.insert(
                    "cta_url".to_string(),
                    json!(format!("{base}/api/{}/dashboard", kind.as_str())),
                );
                object.insert(
                    "unsubscribe_url".to_string(),
                    json!(format!("{base}/api/bills/unsubscribe?email={email}")),
                );
            }
            let notification = NotificationRequest {
                to_address: email,
                subject: crate::notify::Dispatcher::default_subject(template_key)
                    .unwrap_or("Your FinHub Summary")
                    .to_string(),
                template_key: template_key.to_string(),
                payload: data,
                lang: lang.to_string(),
            };
            match state.dispatcher.send(&notification).await {
                Ok(()) => email_sent = true,
                Err(e) => {
                    warn!(flow = kind.as_str(), error = %e, "summary email failed");
                }
            }
        }
    }

    Ok(Json(FlowStepResponse {
        flow: kind.as_str().to_string(),
        step,
        steps_total: kind.steps_total(),
        completed: true,
        record_id: Some(record_id.to_string()),
        email_sent,
    }))
}

/// GET /api/flows/{flow}/draft?owner_key= - resume an in-progress flow
pub async fn get_draft(
    State(state): State<AppState>,
    Path(flow): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<FlowDraft>> {
    let kind = parse_flow(&flow)?;
    validation::validate_owner_key(&query.owner_key).map_validation_err("owner_key")?;

    state
        .drafts
        .get(&query.owner_key, kind)
        .map(Json)
        .ok_or(AppError::DraftNotFound {
            flow: kind.as_str().to_string(),
        })
}

/// DELETE /api/flows/{flow}/draft?owner_key= - abandon an in-progress flow
pub async fn discard_draft(
    State(state): State<AppState>,
    Path(flow): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<serde_json::Value>> {
    let kind = parse_flow(&flow)?;
    validation::validate_owner_key(&query.owner_key).map_validation_err("owner_key")?;

    state.drafts.discard(&query.owner_key, kind);
    Ok(Json(json!({"flow": kind.as_str(), "discarded": true})))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn budget_finalize_computes_surplus() {
        let fields = fields(&[
            ("income", json!(100_000)),
            ("housing", json!(30_000)),
            ("food", json!(20_000)),
            ("transport", json!(5_000)),
            ("dependents", json!(0)),
            ("miscellaneous", json!(5_000)),
            ("others", json!(0)),
            ("savings_goal", json!(10_000)),
        ]);

        let outcome = finalize_budget(&fields).unwrap();
        let RecordPayload::Budget(budget) = outcome.payload else {
            panic!("expected budget payload");
        };
        assert_eq!(budget.fixed_expenses, 55_000.0);
        assert_eq!(budget.variable_expenses, 5_000.0);
        assert_eq!(budget.surplus_deficit, 30_000.0);
    }

    #[test]
    fn comma_separated_amounts_parse() {
        let fields = fields(&[("income", json!("1,250,000"))]);
        assert_eq!(get_f64(&fields, "income").unwrap(), 1_250_000.0);
    }

    #[test]
    fn bill_without_reminder_days_rejected_when_opted_in() {
        let f = fields(&[
            ("bill_name", json!("Rent")),
            ("amount", json!(1000)),
            ("due_date", json!("2999-01-01")),
            ("frequency", json!("monthly")),
            ("category", json!("housing")),
            ("send_email", json!(true)),
        ]);
        let err = validate_step_fields(FlowKind::Bill, 2, &f).unwrap_err();
        assert!(err.to_string().contains("reminder_days"));
    }

    #[test]
    fn past_due_date_rejected_at_step() {
        let f = fields(&[
            ("bill_name", json!("Rent")),
            ("amount", json!(1000)),
            ("due_date", json!("2001-01-01")),
            ("frequency", json!("monthly")),
            ("category", json!("housing")),
        ]);
        let err = validate_step_fields(FlowKind::Bill, 2, &f).unwrap_err();
        assert!(err.to_string().contains("past"));
    }

    #[test]
    fn quiz_scores_and_classifies() {
        let answers: Vec<Value> = (0..QUIZ_QUESTIONS).map(|i| json!(i < 8)).collect();
        let f = fields(&[("answers", json!(answers))]);

        let outcome = finalize_quiz(&f).unwrap();
        let RecordPayload::QuizResult(quiz) = outcome.payload else {
            panic!("expected quiz payload");
        };
        assert_eq!(quiz.score, 8);
        assert_eq!(quiz.personality, "Planner");
        assert_eq!(quiz.badges, vec!["Quiz Master".to_string()]);
    }

    #[test]
    fn health_score_stays_in_bounds() {
        let f = fields(&[
            ("income", json!(100_000)),
            ("expenses", json!(150_000)),
            ("debt", json!(900_000)),
            ("interest_rate", json!(30)),
        ]);
        let outcome = finalize_financial_health(&f).unwrap();
        let RecordPayload::FinancialHealth(health) = outcome.payload else {
            panic!("expected health payload");
        };
        assert!(health.score >= 0.0 && health.score <= 100.0);
        assert_eq!(health.status, "At Risk");
    }

    #[test]
    fn emergency_fund_scales_with_risk_and_dependents() {
        let f = fields(&[
            ("monthly_expenses", json!(50_000)),
            ("monthly_income", json!(120_000)),
            ("current_savings", json!(0)),
            ("risk_tolerance_level", json!("high")),
            ("dependents", json!(4)),
            ("timeline", json!(12)),
        ]);
        let outcome = finalize_emergency_fund(&f).unwrap();
        let RecordPayload::EmergencyFund(fund) = outcome.payload else {
            panic!("expected emergency fund payload");
        };
        assert_eq!(fund.recommended_months, 15);
        assert_eq!(fund.target_amount, 750_000.0);
    }
}
