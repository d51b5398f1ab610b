//! Notification delivery
//!
//! Template rendering plus a two-tier provider chain (HTTP API first, SMTP
//! fallback) with per-provider retry. See [`dispatcher::Dispatcher`].

pub mod dispatcher;
pub mod providers;
pub mod templates;

pub use dispatcher::{DeliveryError, DispatchError, Dispatcher, NotificationRequest, RetryPolicy};
pub use providers::{ApiMailer, MailProvider, OutboundEmail, ProviderError, SmtpMailer};
pub use templates::Channel;

use crate::config::MailConfig;

/// Build the production provider chain from configuration: API first, SMTP
/// as fallback.
pub fn build_dispatcher(config: &MailConfig) -> Dispatcher {
    let providers: Vec<Box<dyn MailProvider>> = vec![
        Box::new(ApiMailer::new(config)),
        Box::new(SmtpMailer::new(config)),
    ];
    Dispatcher::new(providers)
}
