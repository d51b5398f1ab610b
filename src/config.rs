//! Configuration management
//!
//! All tunables in one place with environment variable overrides. Sensible
//! defaults for local development; everything overridable in production via
//! `FINHUB_*` variables.

use std::env;
use std::path::PathBuf;
use tracing::info;

/// Which record store implementation backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    JsonFile,
    Document,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JsonFile => "json",
            Self::Document => "document",
        }
    }
}

/// Notification delivery credentials and endpoints
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Transactional-email API endpoint
    pub api_url: String,
    /// Bearer token for the API provider; absent = provider skipped
    pub api_token: Option<String>,
    /// From address for the API provider; absent = provider skipped
    pub from_email: Option<String>,
    pub from_name: String,
    pub smtp_host: String,
    /// SMTP credentials; absent = fallback provider skipped
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.mailersend.com/v1/email".to_string(),
            api_token: None,
            from_email: None,
            from_name: "FinHub".to_string(),
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_user: None,
            smtp_password: None,
        }
    }
}

impl MailConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("FINHUB_MAIL_API_URL") {
            config.api_url = url;
        }
        config.api_token = env::var("FINHUB_MAIL_API_TOKEN").ok().filter(|s| !s.is_empty());
        config.from_email = env::var("FINHUB_MAIL_FROM").ok().filter(|s| !s.is_empty());
        if let Ok(name) = env::var("FINHUB_MAIL_FROM_NAME") {
            config.from_name = name;
        }
        if let Ok(host) = env::var("FINHUB_SMTP_HOST") {
            config.smtp_host = host;
        }
        config.smtp_user = env::var("FINHUB_SMTP_USER").ok().filter(|s| !s.is_empty());
        config.smtp_password = env::var("FINHUB_SMTP_PASSWORD").ok().filter(|s| !s.is_empty());

        config
    }
}

/// Server configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Root directory for the store file / database and scheduler state
    pub data_dir: PathBuf,
    pub store_backend: StoreBackend,
    /// Seconds between scheduler ticks (default: 86400 = daily)
    pub scheduler_interval_secs: u64,
    /// Default reminder window when a bill carries none
    pub reminder_days_default: u32,
    /// Draft lifetime for multi-step flows (default: 1800 = 30 minutes)
    pub draft_ttl_secs: u64,
    /// Base URL used in email links (dashboard, unsubscribe)
    pub public_base_url: String,
    pub mail: MailConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            store_backend: StoreBackend::Document,
            scheduler_interval_secs: 86_400,
            reminder_days_default: 7,
            draft_ttl_secs: 1_800,
            public_base_url: "http://localhost:8080".to_string(),
            mail: MailConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = env::var("FINHUB_HOST") {
            config.host = host;
        }
        if let Ok(val) = env::var("FINHUB_PORT") {
            if let Ok(port) = val.parse() {
                config.port = port;
            }
        }
        if let Ok(dir) = env::var("FINHUB_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(val) = env::var("FINHUB_STORE_BACKEND") {
            match val.to_lowercase().as_str() {
                "json" | "json_file" => config.store_backend = StoreBackend::JsonFile,
                "document" | "rocksdb" => config.store_backend = StoreBackend::Document,
                other => {
                    tracing::warn!(value = other, "unknown FINHUB_STORE_BACKEND, keeping default");
                }
            }
        }
        if let Ok(val) = env::var("FINHUB_SCHEDULER_INTERVAL") {
            if let Ok(n) = val.parse() {
                config.scheduler_interval_secs = n;
            }
        }
        if let Ok(val) = env::var("FINHUB_REMINDER_DAYS") {
            if let Ok(n) = val.parse() {
                config.reminder_days_default = n;
            }
        }
        if let Ok(val) = env::var("FINHUB_DRAFT_TTL") {
            if let Ok(n) = val.parse() {
                config.draft_ttl_secs = n;
            }
        }
        if let Ok(url) = env::var("FINHUB_PUBLIC_URL") {
            config.public_base_url = url;
        }
        config.mail = MailConfig::from_env();

        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Log the effective configuration at startup (secrets redacted).
    pub fn print_summary(&self) {
        info!("FinHub configuration:");
        info!("   Bind address: {}", self.bind_addr());
        info!("   Data dir: {}", self.data_dir.display());
        info!("   Store backend: {}", self.store_backend.as_str());
        info!(
            "   Scheduler interval: {}s, reminder window default: {} days",
            self.scheduler_interval_secs, self.reminder_days_default
        );
        info!("   Draft TTL: {}s", self.draft_ttl_secs);
        info!(
            "   Mail API: {} ({})",
            self.mail.api_url,
            if self.mail.api_token.is_some() {
                "configured"
            } else {
                "no token"
            }
        );
        info!(
            "   SMTP fallback: {} ({})",
            self.mail.smtp_host,
            if self.mail.smtp_user.is_some() {
                "configured"
            } else {
                "no credentials"
            }
        );
    }
}
