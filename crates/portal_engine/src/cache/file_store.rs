use std::io;
use std::path::{Path, PathBuf};

use portal_logging::portal_debug;

use super::family::CacheFamily;
use super::store::{CacheStore, StoreError, StoredRecord};
use crate::persist::AtomicFileWriter;

const RECORD_EXT: &str = "json";

/// Directory-backed store: `{root}/{family}/{hex(key)}.json`.
///
/// Hex file names keep arbitrary entity identifiers filesystem-safe while
/// preserving key prefixes, so prefix invalidation is a name scan.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn family_dir(&self, family: CacheFamily) -> PathBuf {
        self.root.join(family.as_str())
    }

    fn record_path(&self, family: CacheFamily, key: &str) -> PathBuf {
        self.family_dir(family)
            .join(format!("{}.{RECORD_EXT}", hex::encode(key)))
    }

    /// Every record file in a family directory as `(path, hex stem)`.
    async fn record_files(&self, family: CacheFamily) -> Result<Vec<(PathBuf, String)>, StoreError> {
        let mut dir = match tokio::fs::read_dir(self.family_dir(family)).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                let stem = stem.to_string();
                files.push((path, stem));
            }
        }
        Ok(files)
    }
}

fn key_of(stem: &str) -> Option<String> {
    hex::decode(stem).ok().and_then(|bytes| String::from_utf8(bytes).ok())
}

async fn remove_file(path: &Path) -> Result<bool, StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[async_trait::async_trait]
impl CacheStore for FileStore {
    async fn read(&self, family: CacheFamily, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        let bytes = match tokio::fs::read(self.record_path(family, key)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| StoreError::Corrupt {
                key: key.to_string(),
                reason: err.to_string(),
            })
    }

    async fn write(&self, family: CacheFamily, record: StoredRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&record).map_err(|err| StoreError::Corrupt {
            key: record.key.clone(),
            reason: err.to_string(),
        })?;
        let writer = AtomicFileWriter::new(self.family_dir(family));
        let file_name = format!("{}.{RECORD_EXT}", hex::encode(&record.key));
        let path = tokio::task::spawn_blocking(move || writer.write(&file_name, &bytes))
            .await
            .map_err(|err| StoreError::Io(io::Error::other(err)))??;
        portal_debug!("cache record written to {}", path.display());
        Ok(())
    }

    async fn remove(&self, family: CacheFamily, key: &str) -> Result<bool, StoreError> {
        remove_file(&self.record_path(family, key)).await
    }

    async fn remove_prefix(&self, family: CacheFamily, prefix: &str) -> Result<usize, StoreError> {
        let hex_prefix = hex::encode(prefix);
        let mut removed = 0;
        for (path, stem) in self.record_files(family).await? {
            if stem.starts_with(&hex_prefix) && remove_file(&path).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn evict_oldest(&self, family: CacheFamily) -> Result<Option<String>, StoreError> {
        let mut oldest: Option<(PathBuf, StoredRecord)> = None;
        for (path, stem) in self.record_files(family).await? {
            let Ok(bytes) = tokio::fs::read(&path).await else {
                continue;
            };
            let Ok(record) = serde_json::from_slice::<StoredRecord>(&bytes) else {
                // Unreadable records are the first to go.
                remove_file(&path).await?;
                return Ok(key_of(&stem));
            };
            if oldest
                .as_ref()
                .is_none_or(|(_, current)| record.timestamp < current.timestamp)
            {
                oldest = Some((path, record));
            }
        }
        match oldest {
            Some((path, record)) => {
                remove_file(&path).await?;
                Ok(Some(record.key))
            }
            None => Ok(None),
        }
    }
}
