//! Optional RON configuration file for `portal-docs`.
//!
//! ```ron
//! (
//!     base_url: Some("https://is.example.cz/"),
//!     short_ttl_secs: Some(300),
//!     encryption_key: Some("<64 hex characters>"),
//!     cache_dir: Some("./.portal_cache"),
//!     cookie: Some("iscreds=..."),
//! )
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use portal_core::Locale;
use portal_engine::{EncryptionKey, EngineConfig, TransportSettings};
use portal_logging::portal_info;
use serde::{Deserialize, Serialize};

const DEFAULT_CACHE_DIR: &str = "./.portal_cache";
const BASE_URL_ENV: &str = "PORTAL_BASE_URL";
const COOKIE_ENV: &str = "PORTAL_COOKIE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ConfigFile {
    pub base_url: Option<String>,
    pub short_ttl_secs: Option<u64>,
    pub long_ttl_secs: Option<u64>,
    /// Hex-encoded 32-byte key for sensitive cache families.
    pub encryption_key: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub max_concurrent_requests: Option<usize>,
    pub max_folder_depth: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub locale: Option<Locale>,
    pub cookie: Option<String>,
}

/// Read the file when one is given; environment variables fill the base URL
/// and cookie when the file leaves them out.
pub(crate) fn load(path: Option<&Path>) -> Result<ConfigFile> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let parsed: ConfigFile = ron::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?;
            portal_info!("loaded configuration from {}", path.display());
            parsed
        }
        None => ConfigFile::default(),
    };
    if config.base_url.is_none() {
        config.base_url = std::env::var(BASE_URL_ENV).ok();
    }
    if config.cookie.is_none() {
        config.cookie = std::env::var(COOKIE_ENV).ok();
    }
    Ok(config)
}

impl ConfigFile {
    pub(crate) fn engine_config(&self) -> Result<EngineConfig> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| anyhow!("no base_url configured (config file or {BASE_URL_ENV})"))?;
        let mut config = EngineConfig::parse(base_url)?;

        let short = self
            .short_ttl_secs
            .map_or(config.short_ttl, Duration::from_secs);
        let long = self
            .long_ttl_secs
            .map_or(config.long_ttl, Duration::from_secs);
        config = config.with_ttls(short, long);

        if let Some(key) = self.encryption_key.as_deref() {
            config = config.with_encryption_key(EncryptionKey::from_hex(key)?);
        }
        if let Some(limit) = self.max_concurrent_requests {
            config = config.with_max_concurrent_requests(limit)?;
        }
        if let Some(depth) = self.max_folder_depth {
            config.max_folder_depth = depth;
        }
        if let Some(locale) = self.locale {
            config.preferred_locale = locale;
        }
        Ok(config)
    }

    pub(crate) fn transport_settings(&self) -> TransportSettings {
        let defaults = TransportSettings::default();
        TransportSettings {
            request_timeout: self
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            cookie: self.cookie.clone(),
            ..defaults
        }
    }

    pub(crate) fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ron_file_maps_onto_engine_config() {
        let text = r#"(
            base_url: Some("https://is.example.cz/"),
            short_ttl_secs: Some(60),
            encryption_key: Some("0101010101010101010101010101010101010101010101010101010101010101"),
            max_concurrent_requests: Some(2),
            locale: Some(en),
        )"#;
        let file: ConfigFile = ron::from_str(text).unwrap();
        let config = file.engine_config().unwrap();

        assert_eq!(config.short_ttl, Duration::from_secs(60));
        assert_eq!(config.long_ttl, portal_engine::DEFAULT_LONG_TTL);
        assert_eq!(config.max_concurrent_requests, 2);
        assert_eq!(config.preferred_locale, Locale::En);
        assert!(config.encryption_key.is_some());
        assert_eq!(file.cache_dir(), PathBuf::from(DEFAULT_CACHE_DIR));
    }

    #[test]
    fn bad_key_is_reported() {
        let file = ConfigFile {
            base_url: Some("https://is.example.cz/".into()),
            encryption_key: Some("abc".into()),
            ..ConfigFile::default()
        };
        assert!(file.engine_config().is_err());
    }
}
