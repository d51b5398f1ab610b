//! Application state shared by every handler

use anyhow::{Context, Result};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{ServerConfig, StoreBackend};
use crate::drafts::DraftStore;
use crate::notify::{self, Dispatcher};
use crate::records::{DocumentStore, JsonFileStore, RecordStore};
use crate::scheduler::JobRunner;

/// Application state type alias
pub type AppState = Arc<AppContext>;

pub struct AppContext {
    pub store: Arc<dyn RecordStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub drafts: DraftStore,
    pub config: ServerConfig,
}

impl AppContext {
    /// Wire up the store backend, dispatcher, and draft store from
    /// configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

        let store: Arc<dyn RecordStore> = match config.store_backend {
            StoreBackend::JsonFile => Arc::new(
                JsonFileStore::open(config.data_dir.join("records.json"))
                    .context("opening JSON record store")?,
            ),
            StoreBackend::Document => Arc::new(
                DocumentStore::open(config.data_dir.join("documents"))
                    .context("opening document record store")?,
            ),
        };
        info!(backend = store.backend_name(), "record store ready");

        let dispatcher = Arc::new(notify::build_dispatcher(&config.mail));
        let drafts = DraftStore::new(Duration::from_secs(config.draft_ttl_secs));

        Ok(Self {
            store,
            dispatcher,
            drafts,
            config,
        })
    }

    /// Test seam: assemble state around a pre-built store and dispatcher.
    pub fn with_parts(
        config: ServerConfig,
        store: Arc<dyn RecordStore>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let drafts = DraftStore::new(Duration::from_secs(config.draft_ttl_secs));
        Self {
            store,
            dispatcher,
            drafts,
            config,
        }
    }

    /// Build the background job runner sharing this context's store and
    /// dispatcher.
    pub fn job_runner(&self) -> Arc<JobRunner> {
        Arc::new(JobRunner::new(
            self.store.clone(),
            self.dispatcher.clone(),
            self.config.reminder_days_default,
            self.config.public_base_url.clone(),
            self.config.data_dir.clone(),
        ))
    }
}
