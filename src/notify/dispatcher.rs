//! Notification dispatcher
//!
//! Walks the configured provider list in priority order. Each provider gets
//! up to `max_attempts` tries with exponential backoff (`base * 2^attempt`)
//! on retriable errors; a non-retriable error falls through to the next
//! provider immediately. The first provider that accepts the message wins.
//! Only when every provider was skipped or exhausted does `send` fail, with
//! the last provider error attached.
//!
//! This two-tier fallback is deliberate: it is the difference between "the
//! email never arrives" and "the email arrives via the secondary channel".

use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::providers::{MailProvider, OutboundEmail, ProviderError};
use super::templates;

/// One notification to deliver. Transient: consumed exactly once, never
/// persisted, never retried past the dispatcher's own window.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub to_address: String,
    pub subject: String,
    pub template_key: String,
    pub payload: serde_json::Value,
    pub lang: String,
}

/// All providers skipped or exhausted
#[derive(Debug)]
pub struct DeliveryError {
    pub attempted: Vec<&'static str>,
    pub last: Option<ProviderError>,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last {
            Some(last) => write!(
                f,
                "all providers failed (attempted: {}), last error: {last}",
                self.attempted.join(", ")
            ),
            None => write!(f, "no provider is configured"),
        }
    }
}

impl std::error::Error for DeliveryError {}

#[derive(Debug)]
pub enum DispatchError {
    /// The template key is not in the registry - a caller bug, reported
    /// before any provider is touched.
    UnknownTemplate(String),
    Delivery(DeliveryError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTemplate(key) => write!(f, "unknown template key '{key}'"),
            Self::Delivery(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Per-provider retry knobs. The defaults give the contract sequence:
/// attempt, sleep 2s, attempt, sleep 4s, attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        // base * 2^attempt, attempt is 1-based
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

pub struct Dispatcher {
    providers: Vec<Box<dyn MailProvider>>,
    policy: RetryPolicy,
}

impl Dispatcher {
    /// Providers are tried in the order given.
    pub fn new(providers: Vec<Box<dyn MailProvider>>) -> Self {
        Self {
            providers,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Convenience for callers that want the registry's default subject.
    pub fn default_subject(template_key: &str) -> Option<&'static str> {
        templates::spec_for(template_key).map(|s| s.subject)
    }

    /// Deliver one notification, falling back through the provider list.
    pub async fn send(&self, request: &NotificationRequest) -> Result<(), DispatchError> {
        if templates::spec_for(&request.template_key).is_none() {
            return Err(DispatchError::UnknownTemplate(request.template_key.clone()));
        }

        let mut attempted = Vec::new();
        let mut last_error: Option<ProviderError> = None;

        for provider in &self.providers {
            if !provider.is_configured() {
                debug!(provider = provider.name(), "skipping unconfigured provider");
                continue;
            }
            attempted.push(provider.name());

            // Each provider renders its own template variant.
            let html = match templates::render(
                &request.template_key,
                provider.channel(),
                &request.payload,
                &request.lang,
            ) {
                Ok(html) => html,
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        template_key = %request.template_key,
                        error = %e,
                        "template render failed, trying next provider"
                    );
                    last_error = Some(ProviderError::permanent(provider.name(), e.to_string()));
                    continue;
                }
            };

            let email = OutboundEmail {
                to: request.to_address.clone(),
                subject: request.subject.clone(),
                html,
            };

            match self.try_provider(provider.as_ref(), &email).await {
                Ok(()) => {
                    info!(
                        provider = provider.name(),
                        to = %request.to_address,
                        template_key = %request.template_key,
                        "notification delivered"
                    );
                    return Ok(());
                }
                Err(e) => {
                    error!(
                        provider = provider.name(),
                        to = %request.to_address,
                        error = %e,
                        "provider failed, falling back"
                    );
                    last_error = Some(e);
                }
            }
        }

        error!(
            to = %request.to_address,
            template_key = %request.template_key,
            attempted = ?attempted,
            "all providers exhausted"
        );
        Err(DispatchError::Delivery(DeliveryError {
            attempted,
            last: last_error,
        }))
    }

    /// Retry loop for a single provider. Retriable errors sleep and try
    /// again; non-retriable errors bail out so the caller can fall back.
    async fn try_provider(
        &self,
        provider: &dyn MailProvider,
        email: &OutboundEmail,
    ) -> Result<(), ProviderError> {
        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match provider.deliver(email).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retriable() && attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        provider = provider.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient delivery failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("retry loop always returns")
    }
}
