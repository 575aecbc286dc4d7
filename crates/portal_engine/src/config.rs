use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use portal_core::Locale;
use thiserror::Error;
use url::Url;

/// Source of "now" for TTL decisions.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub const DEFAULT_SHORT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_LONG_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;
pub const DEFAULT_MAX_FOLDER_DEPTH: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid base url {0}")]
    InvalidBaseUrl(String),
    #[error("encryption key must be 64 hex characters (32 bytes): {0}")]
    InvalidKey(String),
    #[error("max_concurrent_requests must be at least 1")]
    ZeroConcurrency,
}

/// 256-bit key for at-rest cache encryption.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(text: &str) -> Result<Self, ConfigError> {
        let bytes = hex::decode(text.trim()).map_err(|e| ConfigError::InvalidKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ConfigError::InvalidKey(format!("got {} bytes", v.len())))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Everything the engine would otherwise read from globals.
#[derive(Clone)]
pub struct EngineConfig {
    pub base_url: Url,
    pub short_ttl: Duration,
    pub long_ttl: Duration,
    pub encryption_key: Option<EncryptionKey>,
    pub max_concurrent_requests: usize,
    pub max_folder_depth: usize,
    pub preferred_locale: Locale,
    pub clock: Clock,
}

impl EngineConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            short_ttl: DEFAULT_SHORT_TTL,
            long_ttl: DEFAULT_LONG_TTL,
            encryption_key: None,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_folder_depth: DEFAULT_MAX_FOLDER_DEPTH,
            preferred_locale: Locale::default(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn parse(base_url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base_url).map_err(|e| ConfigError::InvalidBaseUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self::new(url))
    }

    pub fn with_ttls(mut self, short_ttl: Duration, long_ttl: Duration) -> Self {
        self.short_ttl = short_ttl;
        self.long_ttl = long_ttl;
        self
    }

    pub fn with_encryption_key(mut self, key: EncryptionKey) -> Self {
        self.encryption_key = Some(key);
        self
    }

    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        self.max_concurrent_requests = limit;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("base_url", &self.base_url.as_str())
            .field("short_ttl", &self.short_ttl)
            .field("long_ttl", &self.long_ttl)
            .field("encryption_key", &self.encryption_key)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("max_folder_depth", &self.max_folder_depth)
            .field("preferred_locale", &self.preferred_locale)
            .finish_non_exhaustive()
    }
}
