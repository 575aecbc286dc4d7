use serde::{Deserialize, Serialize};

/// One logical document as listed by the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    #[serde(default)]
    pub subfolder: String,
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub date: String,
    pub attachments: Vec<Attachment>,
}

/// One retrievable part of a [`DocumentEntry`].
///
/// `reference` is a validated, absolute portal URL but not necessarily the
/// final download location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub kind: MediaKind,
    pub reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Pdf,
    Word,
    Spreadsheet,
    Presentation,
    Archive,
    Image,
    Audio,
    Video,
    Text,
    Html,
    Unknown,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Pdf => "pdf",
            MediaKind::Word => "word",
            MediaKind::Spreadsheet => "spreadsheet",
            MediaKind::Presentation => "presentation",
            MediaKind::Archive => "archive",
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Text => "text",
            MediaKind::Html => "html",
            MediaKind::Unknown => "unknown",
        }
    }

    /// Map a type token (`pdf`, `docx`, `mime-pdf`, `ikona-zip`, ...) to a kind.
    ///
    /// Only the part after the last `-` is considered.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_lowercase();
        let tail = token.rsplit('-').next().unwrap_or(token.as_str());
        let kind = match tail {
            "pdf" => MediaKind::Pdf,
            "doc" | "docx" | "odt" | "rtf" | "word" => MediaKind::Word,
            "xls" | "xlsx" | "ods" | "csv" | "excel" => MediaKind::Spreadsheet,
            "ppt" | "pptx" | "odp" | "powerpoint" => MediaKind::Presentation,
            "zip" | "rar" | "7z" | "tar" | "gz" | "tgz" | "archiv" | "archive" => {
                MediaKind::Archive
            }
            "jpg" | "jpeg" | "png" | "gif" | "svg" | "webp" | "img" | "image" | "obrazek" => {
                MediaKind::Image
            }
            "mp3" | "wav" | "ogg" | "flac" | "audio" | "zvuk" => MediaKind::Audio,
            "mp4" | "avi" | "mkv" | "webm" | "mov" | "video" => MediaKind::Video,
            "txt" | "text" | "plain" | "tex" | "md" => MediaKind::Text,
            "html" | "htm" => MediaKind::Html,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_known(self) -> bool {
        self != MediaKind::Unknown
    }
}

/// A subfolder reference found in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderLink {
    pub name: String,
    pub reference: String,
}

/// Which ranked row recognizer produced a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerKind {
    ClassedTable,
    HeaderTable,
    AnyTable,
}

/// How the parser interpreted a page.
///
/// Both `Empty` and `Unrecognized` come with an empty entry list; only the
/// tag tells an empty folder apart from markup the parser did not understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ParseOutcome {
    Detail,
    Listing { recognizer: RecognizerKind },
    Empty,
    Unrecognized,
}

/// Structured result of parsing one portal page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPage {
    pub entries: Vec<DocumentEntry>,
    pub subfolders: Vec<FolderLink>,
    pub pagination: Vec<String>,
    pub total_count: Option<u32>,
    pub outcome: ParseOutcome,
}

impl ParsedPage {
    pub(crate) fn unrecognized() -> Self {
        Self {
            entries: Vec::new(),
            subfolders: Vec::new(),
            pagination: Vec::new(),
            total_count: None,
            outcome: ParseOutcome::Unrecognized,
        }
    }
}

/// Portal interface languages the keyword tables cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Cs,
    Sk,
    En,
}
