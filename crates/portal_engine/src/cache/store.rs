use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::family::CacheFamily;
use crate::persist::PersistError;

/// One persisted cache record. Records are overwritten, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: String,
    pub timestamp: DateTime<Utc>,
    /// Family TTL at write time.
    pub ttl_secs: u64,
    pub payload: StoredPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "format", content = "data")]
pub enum StoredPayload {
    Plain(serde_json::Value),
    /// Output of [`super::crypto::RecordCipher::seal`].
    Encrypted(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("{family} store is full ({limit} records)")]
    QuotaExceeded { family: &'static str, limit: usize },
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Physical storage behind the cache manager, one logical store per family.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn read(&self, family: CacheFamily, key: &str) -> Result<Option<StoredRecord>, StoreError>;
    async fn write(&self, family: CacheFamily, record: StoredRecord) -> Result<(), StoreError>;
    async fn remove(&self, family: CacheFamily, key: &str) -> Result<bool, StoreError>;
    /// Remove every key starting with `prefix`; returns how many went away.
    async fn remove_prefix(&self, family: CacheFamily, prefix: &str) -> Result<usize, StoreError>;
    /// Drop the record with the oldest timestamp, returning its key.
    async fn evict_oldest(&self, family: CacheFamily) -> Result<Option<String>, StoreError>;
}

/// In-process store with an optional per-family record limit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    families: Mutex<HashMap<CacheFamily, BTreeMap<String, StoredRecord>>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes of new keys fail with [`StoreError::QuotaExceeded`] once a
    /// family holds `limit` records.
    pub fn with_capacity(limit: usize) -> Self {
        Self {
            families: Mutex::default(),
            capacity: Some(limit),
        }
    }

    pub fn len(&self, family: CacheFamily) -> usize {
        self.lock().get(&family).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().values().all(BTreeMap::is_empty)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheFamily, BTreeMap<String, StoredRecord>>> {
        self.families.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn read(&self, family: CacheFamily, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.lock().get(&family).and_then(|records| records.get(key).cloned()))
    }

    async fn write(&self, family: CacheFamily, record: StoredRecord) -> Result<(), StoreError> {
        let mut families = self.lock();
        let records = families.entry(family).or_default();
        if let Some(limit) = self.capacity {
            if records.len() >= limit && !records.contains_key(&record.key) {
                return Err(StoreError::QuotaExceeded {
                    family: family.as_str(),
                    limit,
                });
            }
        }
        records.insert(record.key.clone(), record);
        Ok(())
    }

    async fn remove(&self, family: CacheFamily, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .get_mut(&family)
            .is_some_and(|records| records.remove(key).is_some()))
    }

    async fn remove_prefix(&self, family: CacheFamily, prefix: &str) -> Result<usize, StoreError> {
        let mut families = self.lock();
        let Some(records) = families.get_mut(&family) else {
            return Ok(0);
        };
        let before = records.len();
        records.retain(|key, _| !key.starts_with(prefix));
        Ok(before - records.len())
    }

    async fn evict_oldest(&self, family: CacheFamily) -> Result<Option<String>, StoreError> {
        let mut families = self.lock();
        let Some(records) = families.get_mut(&family) else {
            return Ok(None);
        };
        let oldest = records
            .values()
            .min_by_key(|record| record.timestamp)
            .map(|record| record.key.clone());
        if let Some(key) = &oldest {
            records.remove(key);
        }
        Ok(oldest)
    }
}
