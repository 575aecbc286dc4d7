//! Namespaced TTL cache with stale-while-revalidate reads and optional
//! at-rest encryption.
mod crypto;
mod family;
mod file_store;
mod payload;
mod store;

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use portal_logging::{portal_debug, portal_trace, portal_warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::{Clock, EngineConfig};

pub use crypto::{CryptoError, RecordCipher};
pub use family::{CacheFamily, CacheKey, FamilyPolicy, Namespace};
pub use file_store::FileStore;
pub use payload::{FolderListing, ListingPayload};
pub use store::{CacheStore, MemoryStore, StoreError, StoredPayload, StoredRecord};

/// A value read from the cache together with its freshness.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    pub value: T,
    pub stored_at: DateTime<Utc>,
    pub fresh: bool,
}

/// Cheap to clone; clones share the store, cipher and in-flight refreshes.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn CacheStore>,
    cipher: Option<RecordCipher>,
    short_ttl: Duration,
    long_ttl: Duration,
    clock: Clock,
    in_flight: Mutex<HashSet<String>>,
    revalidations: Mutex<Vec<JoinHandle<()>>>,
    plaintext_warned: AtomicBool,
}

impl CacheManager {
    pub fn new(config: &EngineConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                cipher: config.encryption_key.as_ref().map(RecordCipher::new),
                short_ttl: config.short_ttl,
                long_ttl: config.long_ttl,
                clock: config.clock.clone(),
                in_flight: Mutex::default(),
                revalidations: Mutex::default(),
                plaintext_warned: AtomicBool::new(false),
            }),
        }
    }

    pub fn policy(&self, namespace: Namespace) -> FamilyPolicy {
        let family = namespace.family();
        FamilyPolicy {
            family,
            ttl: match family {
                CacheFamily::Short => self.inner.short_ttl,
                CacheFamily::Long => self.inner.long_ttl,
            },
            encrypted: namespace.is_sensitive(),
        }
    }

    /// Read `key` regardless of age. Undecryptable or unparsable records are
    /// purged and reported as a miss.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<Lookup<T>> {
        let family = key.family();
        let raw_key = key.to_string();
        let record = match self.inner.store.read(family, &raw_key).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(err) => {
                portal_warn!("cache read of {raw_key} failed: {err}");
                self.purge(family, &raw_key).await;
                return None;
            }
        };

        let value = match self.open_payload::<T>(&record) {
            Ok(value) => value,
            Err(reason) => {
                portal_warn!("purging cache record {raw_key}: {reason}");
                self.purge(family, &raw_key).await;
                return None;
            }
        };

        let age = (self.inner.clock)().signed_duration_since(record.timestamp);
        let ttl = chrono::Duration::seconds(i64::try_from(record.ttl_secs).unwrap_or(i64::MAX));
        Some(Lookup {
            value,
            stored_at: record.timestamp,
            fresh: age <= ttl,
        })
    }

    /// Stale-while-revalidate read: a stale value is returned immediately
    /// and `refresh` is scheduled in the background, at most once per key
    /// at a time. A miss returns `None` without scheduling anything.
    pub async fn get_or_revalidate<T, F, Fut>(&self, key: &CacheKey, refresh: F) -> Option<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        let lookup = self.lookup::<T>(key).await?;
        if !lookup.fresh {
            self.schedule_revalidation(key.clone(), refresh);
        }
        Some(lookup.value)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        self.lookup(key).await.map(|lookup| lookup.value)
    }

    /// Store `value` under `key`. Failures are logged and swallowed; on a
    /// failed write the family's oldest record is evicted and the write
    /// retried once.
    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let raw_key = key.to_string();
        let policy = self.policy(key.namespace());
        let record = match self.seal_record(&raw_key, policy, value) {
            Ok(record) => record,
            Err(reason) => {
                portal_warn!("cache value for {raw_key} not stored: {reason}");
                return;
            }
        };

        let store = &self.inner.store;
        let Err(first) = store.write(policy.family, record.clone()).await else {
            portal_trace!("cached {raw_key}");
            return;
        };
        portal_warn!("cache write of {raw_key} failed ({first}); evicting oldest record");
        match store.evict_oldest(policy.family).await {
            Ok(Some(evicted)) => portal_debug!("evicted {evicted} from {} store", policy.family.as_str()),
            Ok(None) => {}
            Err(err) => portal_warn!("eviction failed: {err}"),
        }
        if let Err(second) = store.write(policy.family, record).await {
            portal_warn!("cache write of {raw_key} failed again, dropping value: {second}");
        }
    }

    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let raw_key = key.to_string();
        match self.inner.store.remove(key.family(), &raw_key).await {
            Ok(removed) => removed,
            Err(err) => {
                portal_warn!("cache invalidation of {raw_key} failed: {err}");
                false
            }
        }
    }

    /// Remove every key starting with `prefix` in one call. A prefix that
    /// names a namespace only touches that namespace's family.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let families: Vec<CacheFamily> = match Namespace::of_key(prefix) {
            Some(namespace) => vec![namespace.family()],
            None => CacheFamily::ALL.to_vec(),
        };
        let mut removed = 0;
        for family in families {
            match self.inner.store.remove_prefix(family, prefix).await {
                Ok(count) => removed += count,
                Err(err) => portal_warn!("prefix invalidation of {prefix} failed: {err}"),
            }
        }
        portal_debug!("invalidated {removed} cache records under {prefix}");
        removed
    }

    /// Wait for every scheduled background refresh, including ones scheduled
    /// while waiting. Returns how many were awaited.
    pub async fn drain_revalidations(&self) -> usize {
        let mut drained = 0;
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(
                &mut *self
                    .inner
                    .revalidations
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            if handles.is_empty() {
                return drained;
            }
            for handle in handles {
                if let Err(err) = handle.await {
                    portal_warn!("background refresh panicked: {err}");
                }
                drained += 1;
            }
        }
    }

    /// Background refreshes still running.
    pub fn pending_revalidations(&self) -> usize {
        self.inner
            .revalidations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    fn schedule_revalidation<T, F, Fut>(&self, key: CacheKey, refresh: F)
    where
        T: Serialize + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        let raw_key = key.to_string();
        {
            let mut in_flight = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !in_flight.insert(raw_key.clone()) {
                portal_trace!("refresh of {raw_key} already in flight");
                return;
            }
        }
        portal_debug!("{raw_key} is stale; refreshing in background");

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            match refresh().await {
                Some(value) => manager.set(&key, &value).await,
                None => portal_debug!("refresh of {raw_key} produced nothing; keeping stale value"),
            }
            manager
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&raw_key);
        });
        let mut handles = self
            .inner
            .revalidations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle);
    }

    fn seal_record<T: Serialize>(
        &self,
        raw_key: &str,
        policy: FamilyPolicy,
        value: &T,
    ) -> Result<StoredRecord, String> {
        let json = serde_json::to_value(value).map_err(|e| e.to_string())?;
        let payload = match (&self.inner.cipher, policy.encrypted) {
            (Some(cipher), true) => {
                let bytes = serde_json::to_vec(&json).map_err(|e| e.to_string())?;
                StoredPayload::Encrypted(cipher.seal(&bytes).map_err(|e| e.to_string())?)
            }
            (None, true) => {
                if !self.inner.plaintext_warned.swap(true, Ordering::Relaxed) {
                    portal_warn!("no encryption key configured; sensitive cache records are stored in plaintext");
                }
                StoredPayload::Plain(json)
            }
            (_, false) => StoredPayload::Plain(json),
        };
        Ok(StoredRecord {
            key: raw_key.to_string(),
            timestamp: (self.inner.clock)(),
            ttl_secs: policy.ttl.as_secs(),
            payload,
        })
    }

    fn open_payload<T: DeserializeOwned>(&self, record: &StoredRecord) -> Result<T, String> {
        let json = match &record.payload {
            StoredPayload::Plain(json) => json.clone(),
            StoredPayload::Encrypted(sealed) => {
                let cipher = self
                    .inner
                    .cipher
                    .as_ref()
                    .ok_or_else(|| "encrypted record but no key configured".to_string())?;
                let bytes = cipher.open(sealed).map_err(|e| e.to_string())?;
                serde_json::from_slice(&bytes).map_err(|e| e.to_string())?
            }
        };
        serde_json::from_value(json).map_err(|e| e.to_string())
    }

    async fn purge(&self, family: CacheFamily, raw_key: &str) {
        if let Err(err) = self.inner.store.remove(family, raw_key).await {
            portal_warn!("could not purge {raw_key}: {err}");
        }
    }
}
