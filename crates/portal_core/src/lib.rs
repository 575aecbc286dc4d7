//! Portal core: data model, sanitization and the pure HTML table parser.
//!
//! Nothing in this crate performs I/O; the engine crate feeds it markup.
pub mod locale;
mod model;
mod parse;
pub mod sanitize;

pub use model::{
    Attachment, DocumentEntry, FolderLink, Locale, MediaKind, ParseOutcome, ParsedPage,
    RecognizerKind,
};
pub use parse::{find_download_anchor, has_download_marker, is_system_url, TableParser, DOWNLOAD_KEY};
pub use sanitize::{sanitize_text, validate_file_name, validate_url};
