//! Embedded document backend
//!
//! Records are JSON values in a RocksDB instance with two column families:
//!
//! - `records`      - main storage, key `{owner_key}:{record_id}` so an
//!   owner's records are one contiguous prefix scan
//! - `record_index` - secondary keys `id:{record_id}` and
//!   `email:{email}:{record_id}`, each pointing at the main key
//!
//! Owner keys and emails are validated upstream to never contain `:`, which
//! keeps the composite keys unambiguous.

use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Record, RecordId, RecordPayload, RecordStore, StoreError, StoreResult};

const CF_RECORDS: &str = "records";
const CF_INDEX: &str = "record_index";

const PROBE_KEY: &[u8] = b"probe:__writable__";

pub struct DocumentStore {
    db: Arc<DB>,
}

impl DocumentStore {
    /// Open (or create) the database under `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cf_opts = Options::default();
        let descriptors = vec![
            ColumnFamilyDescriptor::new(CF_RECORDS, cf_opts.clone()),
            ColumnFamilyDescriptor::new(CF_INDEX, cf_opts),
        ];

        let db = DB::open_cf_descriptors(&opts, path.as_ref(), descriptors)
            .map_err(|e| StoreError::Unwritable(format!("{}: {e}", path.as_ref().display())))?;

        info!(path = %path.as_ref().display(), "opened document store");
        Ok(Self { db: Arc::new(db) })
    }

    fn records_cf(&self) -> &ColumnFamily {
        self.db.cf_handle(CF_RECORDS).expect("records CF must exist")
    }

    fn index_cf(&self) -> &ColumnFamily {
        self.db
            .cf_handle(CF_INDEX)
            .expect("record_index CF must exist")
    }

    fn main_key(owner_key: &str, id: RecordId) -> Vec<u8> {
        format!("{owner_key}:{id}").into_bytes()
    }

    fn id_key(id: RecordId) -> Vec<u8> {
        format!("id:{id}").into_bytes()
    }

    fn email_key(email: &str, id: RecordId) -> Vec<u8> {
        format!("email:{email}:{id}").into_bytes()
    }

    /// Resolve a record id to its main key through the `id:` index.
    fn lookup_main_key(&self, id: RecordId) -> StoreResult<Option<Vec<u8>>> {
        self.db
            .get_cf(self.index_cf(), Self::id_key(id))
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn get_by_main_key(&self, main_key: &[u8]) -> StoreResult<Option<Record>> {
        let Some(raw) = self
            .db
            .get_cf(self.records_cf(), main_key)
            .map_err(|e| StoreError::Backend(e.to_string()))?
        else {
            return Ok(None);
        };
        let record =
            serde_json::from_slice(&raw).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Some(record))
    }

    /// Prefix scan over the main CF, decoding values and logging (not
    /// propagating) individually corrupt entries.
    fn scan_records(&self, prefix: &[u8]) -> StoreResult<Vec<Record>> {
        let mut out = Vec::new();
        for item in self.db.prefix_iterator_cf(self.records_cf(), prefix) {
            let (key, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            match serde_json::from_slice::<Record>(&value) {
                Ok(record) => out.push(record),
                Err(e) => {
                    warn!(error = %e, "skipping undecodable record value");
                }
            }
        }
        Ok(out)
    }
}

impl RecordStore for DocumentStore {
    fn append(
        &self,
        payload: RecordPayload,
        owner_key: &str,
        contact_email: Option<&str>,
        lang: Option<&str>,
    ) -> StoreResult<RecordId> {
        let record = Record {
            id: RecordId::generate(),
            owner_key: owner_key.to_string(),
            created_at: Utc::now(),
            contact_email: contact_email.map(str::to_string),
            lang: lang.map(str::to_string),
            payload,
        };
        let id = record.id;

        let value =
            serde_json::to_vec(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let main_key = Self::main_key(owner_key, id);

        let mut batch = WriteBatch::default();
        batch.put_cf(self.records_cf(), &main_key, &value);
        batch.put_cf(self.index_cf(), Self::id_key(id), &main_key);
        if let Some(email) = contact_email {
            batch.put_cf(self.index_cf(), Self::email_key(email, id), &main_key);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Unwritable(e.to_string()))?;

        info!(record_id = %id, owner_key, "appended record");
        Ok(id)
    }

    fn read_all(&self) -> StoreResult<Vec<Record>> {
        let mut out = Vec::new();
        for item in self.db.iterator_cf(self.records_cf(), rocksdb::IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            match serde_json::from_slice::<Record>(&value) {
                Ok(record) => out.push(record),
                Err(e) => {
                    warn!(error = %e, "skipping undecodable record value");
                }
            }
        }
        Ok(out)
    }

    fn filter_by_owner(&self, owner_key: &str) -> StoreResult<Vec<Record>> {
        let prefix = format!("{owner_key}:").into_bytes();
        self.scan_records(&prefix)
    }

    fn filter_by_email(&self, email: &str) -> StoreResult<Vec<Record>> {
        let prefix = format!("email:{email}:").into_bytes();
        let mut out = Vec::new();
        for item in self.db.prefix_iterator_cf(self.index_cf(), &prefix) {
            let (key, main_key) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            if !key.starts_with(prefix.as_slice()) {
                break;
            }
            if let Some(record) = self.get_by_main_key(&main_key)? {
                out.push(record);
            }
        }
        Ok(out)
    }

    fn get_by_id(&self, id: RecordId) -> StoreResult<Option<Record>> {
        let Some(main_key) = self.lookup_main_key(id)? else {
            return Ok(None);
        };
        self.get_by_main_key(&main_key)
    }

    fn update_by_id(&self, id: RecordId, payload: RecordPayload) -> StoreResult<bool> {
        let Some(main_key) = self.lookup_main_key(id)? else {
            warn!(record_id = %id, "update on unknown record id");
            return Ok(false);
        };
        let Some(mut record) = self.get_by_main_key(&main_key)? else {
            // Index entry without a record: repair by treating as missing.
            warn!(record_id = %id, "dangling id index entry");
            return Ok(false);
        };

        record.payload = payload;
        let value =
            serde_json::to_vec(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.db
            .put_cf(self.records_cf(), &main_key, &value)
            .map_err(|e| StoreError::Unwritable(e.to_string()))?;
        Ok(true)
    }

    fn delete_by_id(&self, id: RecordId) -> StoreResult<bool> {
        let Some(main_key) = self.lookup_main_key(id)? else {
            return Ok(false);
        };
        let record = self.get_by_main_key(&main_key)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.records_cf(), &main_key);
        batch.delete_cf(self.index_cf(), Self::id_key(id));
        if let Some(email) = record.as_ref().and_then(|r| r.contact_email.as_deref()) {
            batch.delete_cf(self.index_cf(), Self::email_key(email, id));
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Unwritable(e.to_string()))?;
        info!(record_id = %id, "deleted record");
        Ok(true)
    }

    fn is_writable(&self) -> bool {
        let cf = self.index_cf();
        self.db.put_cf(cf, PROBE_KEY, b"1").is_ok() && self.db.delete_cf(cf, PROBE_KEY).is_ok()
    }

    fn flush(&self) -> StoreResult<()> {
        use rocksdb::FlushOptions;
        let mut flush_opts = FlushOptions::default();
        flush_opts.set_wait(true);
        for cf_name in &[CF_RECORDS, CF_INDEX] {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db
                    .flush_cf_opt(cf, &flush_opts)
                    .map_err(|e| StoreError::Backend(format!("flush {cf_name}: {e}")))?;
            }
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "document"
    }
}
