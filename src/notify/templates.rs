//! Email template registry and rendering
//!
//! Template sources are compiled into the binary. Each template key maps to
//! a default subject plus one template per delivery channel; a channel
//! without its own template falls back to the API channel's template.
//!
//! Rendering is two-pass: the first pass is strict, and when it trips over
//! an undefined variable the miss is logged and the template is re-rendered
//! once leniently (missing keys become empty strings). There is no third
//! pass.

use anyhow::{anyhow, Context, Result};
use minijinja::{Environment, UndefinedBehavior};
use std::sync::OnceLock;
use tracing::warn;

/// Delivery channel, used to pick the provider-specific template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Api,
    Smtp,
}

pub struct TemplateSpec {
    pub key: &'static str,
    pub subject: &'static str,
    api_template: &'static str,
    smtp_template: Option<&'static str>,
}

impl TemplateSpec {
    fn template_name(&self, channel: Channel) -> &'static str {
        match channel {
            Channel::Api => self.api_template,
            Channel::Smtp => self.smtp_template.unwrap_or(self.api_template),
        }
    }
}

/// Static template registry, one entry per notification kind
const REGISTRY: &[TemplateSpec] = &[
    TemplateSpec {
        key: "budget",
        subject: "Your Monthly Budget Summary",
        api_template: "budget_email.html",
        smtp_template: Some("budget_email_smtp.html"),
    },
    TemplateSpec {
        key: "bill_reminder",
        subject: "Bill Payment Reminder",
        api_template: "bill_reminder.html",
        smtp_template: Some("bill_reminder_smtp.html"),
    },
    TemplateSpec {
        key: "net_worth",
        subject: "Your Net Worth Summary",
        api_template: "net_worth_email.html",
        smtp_template: None,
    },
    TemplateSpec {
        key: "emergency_fund",
        subject: "Your Emergency Fund Plan",
        api_template: "emergency_fund_email.html",
        smtp_template: None,
    },
    TemplateSpec {
        key: "financial_health",
        subject: "Your Financial Health Report",
        api_template: "health_score_email.html",
        smtp_template: None,
    },
    TemplateSpec {
        key: "quiz",
        subject: "Your Money Personality Results",
        api_template: "quiz_email.html",
        smtp_template: None,
    },
];

const SOURCES: &[(&str, &str)] = &[
    (
        "budget_email.html",
        include_str!("../../templates/budget_email.html"),
    ),
    (
        "budget_email_smtp.html",
        include_str!("../../templates/budget_email_smtp.html"),
    ),
    (
        "bill_reminder.html",
        include_str!("../../templates/bill_reminder.html"),
    ),
    (
        "bill_reminder_smtp.html",
        include_str!("../../templates/bill_reminder_smtp.html"),
    ),
    (
        "net_worth_email.html",
        include_str!("../../templates/net_worth_email.html"),
    ),
    (
        "emergency_fund_email.html",
        include_str!("../../templates/emergency_fund_email.html"),
    ),
    (
        "health_score_email.html",
        include_str!("../../templates/health_score_email.html"),
    ),
    (
        "quiz_email.html",
        include_str!("../../templates/quiz_email.html"),
    ),
];

pub fn spec_for(key: &str) -> Option<&'static TemplateSpec> {
    REGISTRY.iter().find(|s| s.key == key)
}

pub fn known_keys() -> Vec<&'static str> {
    REGISTRY.iter().map(|s| s.key).collect()
}

fn build_env(behavior: UndefinedBehavior) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(behavior);
    for (name, source) in SOURCES {
        env.add_template(name, source)
            .unwrap_or_else(|e| panic!("invalid built-in template {name}: {e}"));
    }
    env
}

fn strict_env() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(|| build_env(UndefinedBehavior::Strict))
}

fn lenient_env() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(|| build_env(UndefinedBehavior::Lenient))
}

/// Render the template for `key` on the given channel.
///
/// `data` must be a JSON object; `lang` is injected into the context under
/// the `lang` key.
pub fn render(
    key: &str,
    channel: Channel,
    data: &serde_json::Value,
    lang: &str,
) -> Result<String> {
    let spec = spec_for(key).ok_or_else(|| {
        anyhow!(
            "unknown template key '{key}' (valid: {})",
            known_keys().join(", ")
        )
    })?;
    let name = spec.template_name(channel);

    let mut context = match data {
        serde_json::Value::Object(map) => map.clone(),
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("data".to_string(), other.clone());
            map
        }
    };
    context.insert("lang".to_string(), serde_json::Value::from(lang));

    let template = strict_env()
        .get_template(name)
        .with_context(|| format!("template {name} not registered"))?;

    match template.render(&context) {
        Ok(html) => Ok(html),
        Err(e) if e.kind() == minijinja::ErrorKind::UndefinedError => {
            warn!(template = name, error = %e, "missing template key, re-rendering leniently");
            let template = lenient_env()
                .get_template(name)
                .with_context(|| format!("template {name} not registered"))?;
            template
                .render(&context)
                .with_context(|| format!("lenient render of {name} failed"))
        }
        Err(e) => Err(anyhow!("cannot render template {name}: {e}")),
    }
}
