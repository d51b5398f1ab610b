//! Flat-file JSON backend
//!
//! Records live in a single JSON array on disk. Every mutation rewrites the
//! whole file through a write-temp-then-rename cycle, so a crash mid-write
//! leaves either the old array or the new one, never a torn file. Mutations
//! serialize through an internal lock; readers re-read the file each call.

use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{Record, RecordId, RecordPayload, RecordStore, StoreError, StoreResult};

pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or create) the store file. Fails when the file cannot be
    /// created or is not writable, mirroring the append contract.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .map_err(|e| StoreError::Unwritable(format!("{}: {e}", dir.display())))?;
            }
        }

        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };

        if !store.path.exists() {
            store.write_records(&[])?;
            info!(path = %store.path.display(), "created record store file");
        }

        if !store.is_writable() {
            return Err(StoreError::Unwritable(format!(
                "{} is not writable",
                store.path.display()
            )));
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the whole array. Entries that fail to decode are
    /// logged and skipped instead of poisoning every read.
    fn read_records(&self) -> StoreResult<Vec<Record>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read(&self.path)
            .map_err(|e| StoreError::Backend(format!("{}: {e}", self.path.display())))?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<serde_json::Value> = serde_json::from_slice(&raw)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", self.path.display())))?;

        let mut records = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_value::<Record>(value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "skipping malformed record");
                }
            }
        }
        Ok(records)
    }

    /// Atomic replace: serialize to `<file>.tmp` in the same directory,
    /// fsync, then rename over the live file.
    fn write_records(&self, records: &[Record]) -> StoreResult<()> {
        let tmp_path = self.path.with_extension("json.tmp");

        let body = serde_json::to_vec_pretty(records)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tmp = File::create(&tmp_path)
            .map_err(|e| StoreError::Unwritable(format!("{}: {e}", tmp_path.display())))?;
        tmp.write_all(&body)
            .and_then(|_| tmp.sync_all())
            .map_err(|e| StoreError::Unwritable(format!("{}: {e}", tmp_path.display())))?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path)
            .map_err(|e| StoreError::Unwritable(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn append(
        &self,
        payload: RecordPayload,
        owner_key: &str,
        contact_email: Option<&str>,
        lang: Option<&str>,
    ) -> StoreResult<RecordId> {
        let _guard = self.write_lock.lock();

        let mut records = self.read_records()?;
        let record = Record {
            id: RecordId::generate(),
            owner_key: owner_key.to_string(),
            created_at: Utc::now(),
            contact_email: contact_email.map(str::to_string),
            lang: lang.map(str::to_string),
            payload,
        };
        let id = record.id;
        records.push(record);
        self.write_records(&records)?;

        info!(record_id = %id, owner_key, "appended record");
        Ok(id)
    }

    fn read_all(&self) -> StoreResult<Vec<Record>> {
        self.read_records()
    }

    fn filter_by_owner(&self, owner_key: &str) -> StoreResult<Vec<Record>> {
        let records = self.read_records()?;
        Ok(records
            .into_iter()
            .filter(|r| r.owner_key == owner_key)
            .collect())
    }

    fn filter_by_email(&self, email: &str) -> StoreResult<Vec<Record>> {
        let records = self.read_records()?;
        Ok(records
            .into_iter()
            .filter(|r| r.contact_email.as_deref() == Some(email))
            .collect())
    }

    fn get_by_id(&self, id: RecordId) -> StoreResult<Option<Record>> {
        let records = self.read_records()?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    fn update_by_id(&self, id: RecordId, payload: RecordPayload) -> StoreResult<bool> {
        let _guard = self.write_lock.lock();

        let mut records = self.read_records()?;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            warn!(record_id = %id, "update on unknown record id");
            return Ok(false);
        };
        record.payload = payload;
        self.write_records(&records)?;
        Ok(true)
    }

    fn delete_by_id(&self, id: RecordId) -> StoreResult<bool> {
        let _guard = self.write_lock.lock();

        let mut records = self.read_records()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.write_records(&records)?;
        info!(record_id = %id, "deleted record");
        Ok(true)
    }

    fn is_writable(&self) -> bool {
        OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map(|_| true)
            .unwrap_or(false)
    }

    fn flush(&self) -> StoreResult<()> {
        // Every mutation already lands on disk via rename; nothing buffered.
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "json_file"
    }
}
