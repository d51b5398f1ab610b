//! Delivery providers
//!
//! Two channels: the transactional-email HTTP API (primary) and
//! SMTP-over-TLS (fallback). Each provider reports whether it is configured
//! (missing credentials mean it is skipped, not failed) and classifies its
//! own errors as retriable or not - network-level failures are retried,
//! provider rejections are not.

use futures::future::BoxFuture;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::fmt;
use std::time::Duration;

use super::templates::Channel;
use crate::config::MailConfig;

/// Rendered message ready for handoff to a provider
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// A single provider failure, tagged with whether retrying can help
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: &'static str,
    pub message: String,
    retriable: bool,
}

impl ProviderError {
    pub fn transient(provider: &'static str, message: impl Into<String>) -> Self {
        Self {
            provider,
            message: message.into(),
            retriable: true,
        }
    }

    pub fn permanent(provider: &'static str, message: impl Into<String>) -> Self {
        Self {
            provider,
            message: message.into(),
            retriable: false,
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.retriable
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.message)
    }
}

impl std::error::Error for ProviderError {}

/// One delivery channel. Object-safe so the dispatcher can hold an ordered
/// provider list (and tests can inject scripted providers).
pub trait MailProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Which template variant this provider renders
    fn channel(&self) -> Channel;

    /// Providers with missing credentials are skipped, never attempted.
    fn is_configured(&self) -> bool;

    fn deliver<'a>(
        &'a self,
        email: &'a OutboundEmail,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;
}

// A shared handle to a provider is itself a provider: every method just
// forwards to the inner value. This lets a caller keep an `Arc` clone while
// the dispatcher owns the provider through the same trait object.
impl<T: MailProvider + ?Sized> MailProvider for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn channel(&self) -> Channel {
        (**self).channel()
    }

    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }

    fn deliver<'a>(
        &'a self,
        email: &'a OutboundEmail,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        (**self).deliver(email)
    }
}

// ============================================================================
// HTTP API PROVIDER
// ============================================================================

const API_PROVIDER_NAME: &str = "mail_api";
const API_TIMEOUT: Duration = Duration::from_secs(10);

/// Transactional-email HTTP API client (bearer token, JSON payload)
pub struct ApiMailer {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    from_email: Option<String>,
    from_name: String,
}

impl ApiMailer {
    pub fn new(config: &MailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");

        Self {
            client,
            endpoint: config.api_url.clone(),
            token: config.api_token.clone(),
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        }
    }
}

impl MailProvider for ApiMailer {
    fn name(&self) -> &'static str {
        API_PROVIDER_NAME
    }

    fn channel(&self) -> Channel {
        Channel::Api
    }

    fn is_configured(&self) -> bool {
        self.token.is_some() && self.from_email.is_some()
    }

    fn deliver<'a>(
        &'a self,
        email: &'a OutboundEmail,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let (Some(token), Some(from_email)) = (&self.token, &self.from_email) else {
                return Err(ProviderError::permanent(
                    API_PROVIDER_NAME,
                    "API token or from address not set",
                ));
            };

            let payload = serde_json::json!({
                "from": {"email": from_email, "name": self.from_name},
                "to": [{"email": email.to}],
                "subject": email.subject,
                "html": email.html,
            });

            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(token)
                .json(&payload)
                .send()
                .await
                // Network-level failures (connect, timeout, reset) are the
                // retriable class.
                .map_err(|e| ProviderError::transient(API_PROVIDER_NAME, e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::permanent(
                API_PROVIDER_NAME,
                format!("API error: {status} {body}"),
            ))
        })
    }
}

// ============================================================================
// SMTP PROVIDER
// ============================================================================

const SMTP_PROVIDER_NAME: &str = "smtp";

/// SMTP fallback over implicit TLS (port 465). Sends run on the blocking
/// pool since the transport is synchronous.
pub struct SmtpMailer {
    host: String,
    user: Option<String>,
    password: Option<String>,
    from_name: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            host: config.smtp_host.clone(),
            user: config.smtp_user.clone(),
            password: config.smtp_password.clone(),
            from_name: config.from_name.clone(),
        }
    }

    fn send_blocking(
        host: &str,
        user: &str,
        password: &str,
        from_name: &str,
        email: &OutboundEmail,
    ) -> Result<(), ProviderError> {
        let from: Mailbox = format!("{from_name} <{user}>")
            .parse()
            .map_err(|e| ProviderError::permanent(SMTP_PROVIDER_NAME, format!("bad from address: {e}")))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| ProviderError::permanent(SMTP_PROVIDER_NAME, format!("bad to address: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())
            .map_err(|e| ProviderError::permanent(SMTP_PROVIDER_NAME, e.to_string()))?;

        let transport = SmtpTransport::relay(host)
            .map_err(|e| ProviderError::transient(SMTP_PROVIDER_NAME, e.to_string()))?
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .build();

        transport.send(&message).map(|_| ()).map_err(|e| {
            // 5xx SMTP replies are final; everything else (4xx, I/O,
            // connection) gets the retry treatment.
            if e.is_permanent() {
                ProviderError::permanent(SMTP_PROVIDER_NAME, e.to_string())
            } else {
                ProviderError::transient(SMTP_PROVIDER_NAME, e.to_string())
            }
        })
    }
}

impl MailProvider for SmtpMailer {
    fn name(&self) -> &'static str {
        SMTP_PROVIDER_NAME
    }

    fn channel(&self) -> Channel {
        Channel::Smtp
    }

    fn is_configured(&self) -> bool {
        self.user.is_some() && self.password.is_some()
    }

    fn deliver<'a>(
        &'a self,
        email: &'a OutboundEmail,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let (Some(user), Some(password)) = (self.user.clone(), self.password.clone()) else {
                return Err(ProviderError::permanent(
                    SMTP_PROVIDER_NAME,
                    "SMTP user or password not set",
                ));
            };

            let host = self.host.clone();
            let from_name = self.from_name.clone();
            let email = email.clone();

            tokio::task::spawn_blocking(move || {
                Self::send_blocking(&host, &user, &password, &from_name, &email)
            })
            .await
            .map_err(|e| {
                ProviderError::permanent(SMTP_PROVIDER_NAME, format!("send task failed: {e}"))
            })?
        })
    }
}
