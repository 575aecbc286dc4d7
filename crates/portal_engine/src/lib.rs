//! Portal engine: retrieval, link resolution, caching and folder discovery
//! on top of the pure parser in `portal_core`.
pub mod cache;
mod config;
mod decode;
mod discovery;
mod filename;
mod persist;
mod resolver;
mod transport;
mod types;

pub use cache::{CacheKey, CacheManager, FileStore, FolderListing, MemoryStore, Namespace};
pub use config::{
    Clock, ConfigError, EncryptionKey, EngineConfig, DEFAULT_LONG_TTL, DEFAULT_MAX_CONCURRENT_REQUESTS,
    DEFAULT_MAX_FOLDER_DEPTH, DEFAULT_SHORT_TTL,
};
pub use decode::{decode_markup, DecodedMarkup};
pub use discovery::{DocumentEngine, FolderRef};
pub use filename::{filename_from_disposition, generated_filename};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use resolver::{ContentKind, LinkResolver, Resolution, ResolvedLocation};
pub use transport::{LimitedTransport, ReqwestTransport, Transport, TransportSettings};
pub use types::{FailureKind, TransportError, TransportResponse};
