use std::sync::LazyLock;

use portal_core::validate_file_name;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

static DISPOSITION_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*(?:"([^"]*)"|([^;\s]+))"#).unwrap()
});

/// File name announced by a `Content-Disposition` header (quoted or bare
/// token), made safe for the local filesystem.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let caps = DISPOSITION_FILENAME.captures(header)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    validate_file_name(raw)
}

/// Deterministic fallback: `{stem}--{short_hash(uri)}.{ext}` where the stem
/// is the last path segment and the extension comes from the content type.
pub fn generated_filename(uri: &str, content_type: Option<&str>) -> String {
    let stem = Url::parse(uri)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))
        })
        .map(|segment| segment.split('.').next().unwrap_or_default().to_string())
        .and_then(|segment| validate_file_name(&segment))
        .unwrap_or_else(|| "document".to_string());
    let hash = short_hash(uri);
    match extension_for(content_type) {
        Some(ext) => format!("{stem}--{hash}.{ext}"),
        None => format!("{stem}--{hash}"),
    }
}

fn extension_for(content_type: Option<&str>) -> Option<&'static str> {
    let essence = content_type?.split(';').next()?.trim().to_ascii_lowercase();
    if essence == "application/octet-stream" {
        return None;
    }
    mime_guess::get_mime_extensions_str(&essence)?.first().copied()
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
