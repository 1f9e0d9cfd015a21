//! Package storage.
//!
//! The core never reaches for a global store: whoever owns the process
//! builds a [`StorageProvider`] and hands it to the components that need it.

use crate::types::PackageType;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};
use uuid::Uuid;

/// Default length of generated package ids.
pub const DEFAULT_ID_SIZE: usize = 10;

/// Raw upload as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    /// Shared so that handing a record out never copies the archive
    pub bytes: Arc<[u8]>,
}

/// Everything needed to store a package.
#[derive(Debug, Clone)]
pub struct PackageInput {
    pub id: String,
    pub package_type: PackageType,
    pub file: StoredFile,
    /// Defaults to now
    pub uploaded_at: Option<SystemTime>,
}

/// A stored package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub id: String,
    pub package_type: PackageType,
    pub file: StoredFile,
    pub uploaded_at: SystemTime,
    pub expires_at: Option<SystemTime>,
}

impl PackageRecord {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}

/// Storage backend for uploaded packages.
pub trait StorageProvider: Send + Sync {
    fn store(&self, input: PackageInput) -> PackageRecord;
    fn get(&self, id: &str) -> Option<PackageRecord>;
    fn delete(&self, id: &str) -> bool;
    fn list(&self) -> Vec<PackageRecord>;
    fn clear(&self);

    fn exists(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// Options for [`InMemoryStorage`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageOptions {
    /// Records expire this long after upload; `None` keeps them forever
    pub ttl: Option<Duration>,
}

/// Process-local storage. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    records: Mutex<HashMap<String, PackageRecord>>,
    options: StorageOptions,
}

impl InMemoryStorage {
    pub fn new(options: StorageOptions) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            options,
        }
    }

    /// Drops every expired record.
    pub fn purge_expired(&self) {
        let now = SystemTime::now();
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        let purged = before - records.len();
        if purged > 0 {
            debug!(purged, "Purged expired packages");
        }
    }
}

impl StorageProvider for InMemoryStorage {
    fn store(&self, input: PackageInput) -> PackageRecord {
        let uploaded_at = input.uploaded_at.unwrap_or_else(SystemTime::now);
        let record = PackageRecord {
            id: input.id,
            package_type: input.package_type,
            file: input.file,
            uploaded_at,
            // A TTL past the end of representable time never expires.
            expires_at: self.options.ttl.and_then(|ttl| uploaded_at.checked_add(ttl)),
        };

        info!(
            id = %record.id,
            package_type = %record.package_type,
            size = record.file.size,
            "Stored package"
        );
        self.records.lock().insert(record.id.clone(), record.clone());
        record
    }

    fn get(&self, id: &str) -> Option<PackageRecord> {
        let mut records = self.records.lock();
        let record = records.get(id)?;
        if record.is_expired(SystemTime::now()) {
            debug!(id, "Evicting expired package");
            records.remove(id);
            return None;
        }
        Some(record.clone())
    }

    fn delete(&self, id: &str) -> bool {
        self.records.lock().remove(id).is_some()
    }

    fn list(&self) -> Vec<PackageRecord> {
        self.purge_expired();
        self.records.lock().values().cloned().collect()
    }

    fn clear(&self) {
        self.records.lock().clear();
    }
}

/// Short random identifier, optionally namespaced as `{prefix}_{id}`.
pub fn generate_id(prefix: Option<&str>, size: usize) -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(size.clamp(1, id.len()));
    match prefix {
        Some(prefix) => format!("{}_{}", prefix, id),
        None => id,
    }
}
