//! Input validation at the flow boundary
//!
//! The record store is payload-agnostic; everything user-supplied is
//! checked here before it reaches a store or the dispatcher.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

pub const MAX_OWNER_KEY_LENGTH: usize = 128;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_EMAIL_LENGTH: usize = 120;
pub const MAX_AMOUNT: f64 = 1_000_000_000_000.0;
pub const MAX_REMINDER_DAYS: u32 = 30;

/// Validate an owner key (session or user identifier).
///
/// The character set deliberately excludes `:` - composite store keys rely
/// on it as a separator.
pub fn validate_owner_key(owner_key: &str) -> Result<()> {
    if owner_key.is_empty() {
        return Err(anyhow!("owner_key cannot be empty"));
    }
    if owner_key.len() > MAX_OWNER_KEY_LENGTH {
        return Err(anyhow!(
            "owner_key too long: {} chars (max: {})",
            owner_key.len(),
            MAX_OWNER_KEY_LENGTH
        ));
    }
    if !owner_key
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '@' || c == '.')
    {
        return Err(anyhow!(
            "owner_key contains invalid characters (allowed: alphanumeric, -, _, @, .)"
        ));
    }
    Ok(())
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("static regex")
    })
}

pub fn validate_email(email: &str) -> Result<()> {
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(anyhow!(
            "email too long: {} chars (max: {})",
            email.len(),
            MAX_EMAIL_LENGTH
        ));
    }
    if !email_regex().is_match(email) {
        return Err(anyhow!("invalid email address"));
    }
    Ok(())
}

pub fn validate_record_id(record_id: &str) -> Result<crate::records::RecordId> {
    crate::records::RecordId::parse(record_id)
        .map_err(|e| anyhow!("invalid record id UUID format: {e}"))
}

/// Monetary amounts: finite, non-negative, bounded.
pub fn validate_amount(field: &str, amount: f64) -> Result<()> {
    if !amount.is_finite() {
        return Err(anyhow!("{field} must be a finite number"));
    }
    if amount < 0.0 {
        return Err(anyhow!("{field} cannot be negative"));
    }
    if amount > MAX_AMOUNT {
        return Err(anyhow!("{field} too large (max: {MAX_AMOUNT})"));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow!("name cannot be empty"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(anyhow!(
            "name too long: {} chars (max: {})",
            name.len(),
            MAX_NAME_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_due_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("due_date must be YYYY-MM-DD, got '{raw}'"))
}

pub fn validate_reminder_days(days: u32) -> Result<()> {
    if days == 0 || days > MAX_REMINDER_DAYS {
        return Err(anyhow!(
            "reminder_days must be between 1 and {MAX_REMINDER_DAYS}"
        ));
    }
    Ok(())
}

/// Normalize a language tag; anything unknown falls back to English.
pub fn normalize_lang(lang: Option<&str>) -> &'static str {
    match lang {
        Some("ha") => "ha",
        Some("en") | None => "en",
        Some(other) => {
            tracing::warn!(lang = other, "unsupported language tag, falling back to 'en'");
            "en"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_key_rejects_colon() {
        assert!(validate_owner_key("abc:def").is_err());
        assert!(validate_owner_key("session-1_a@b.c").is_ok());
        assert!(validate_owner_key("").is_err());
        assert!(validate_owner_key(&"x".repeat(200)).is_err());
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn amounts_are_bounded() {
        assert!(validate_amount("amount", 100.0).is_ok());
        assert!(validate_amount("amount", -1.0).is_err());
        assert!(validate_amount("amount", f64::NAN).is_err());
        assert!(validate_amount("amount", f64::INFINITY).is_err());
    }

    #[test]
    fn due_date_parses_iso_only() {
        assert!(validate_due_date("2025-03-01").is_ok());
        assert!(validate_due_date("01/03/2025").is_err());
    }

    #[test]
    fn lang_normalization_falls_back() {
        assert_eq!(normalize_lang(Some("ha")), "ha");
        assert_eq!(normalize_lang(Some("fr")), "en");
        assert_eq!(normalize_lang(None), "en");
    }
}
