//! Bounding and vetting of every string that leaves the parser.

use url::Url;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_COMMENT_LEN: usize = 1024;
pub const MAX_AUTHOR_LEN: usize = 128;
pub const MAX_DATE_LEN: usize = 64;
pub const MAX_URL_LEN: usize = 2048;
const MAX_FILE_NAME_LEN: usize = 120;

/// Collapse whitespace, drop control characters and angle brackets, and cap
/// the result at `max_len` characters.
pub fn sanitize_text(input: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max_len));
    let mut prev_space = true;
    let mut count = 0;
    for ch in input.chars() {
        if count >= max_len {
            break;
        }
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
                count += 1;
            }
            continue;
        }
        if ch.is_control() || ch == '<' || ch == '>' || ch == '\u{FEFF}' {
            continue;
        }
        out.push(ch);
        prev_space = false;
        count += 1;
    }
    out.trim_end().to_string()
}

/// Turn an arbitrary label into a file name that is safe on every desktop OS.
///
/// Returns `None` when nothing usable remains.
pub fn validate_file_name(input: &str) -> Option<String> {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);
    if cleaned.is_empty() {
        return None;
    }

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }

    let mut name = truncate_chars(&compacted, MAX_FILE_NAME_LEN);
    let stem_len = name.split('.').next().map(str::len).unwrap_or_default();
    if is_reserved_windows_name(&name[..stem_len]) {
        name.insert(stem_len, '_');
    }
    Some(name)
}

/// Resolve `raw` against `allowed` and accept it only when it stays on the
/// same host and port over http(s).
///
/// Legacy `;` query separators are rewritten to `&` and fragments dropped so
/// the returned URL is a canonical reference usable for deduplication.
pub fn validate_url(raw: &str, allowed: &Url) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_URL_LEN {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("data:")
        || lower.starts_with("tel:")
    {
        return None;
    }

    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => allowed.join(trimmed).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let same_host = match (url.host_str(), allowed.host_str()) {
        (Some(host), Some(expected)) => host.eq_ignore_ascii_case(expected),
        _ => false,
    };
    if !same_host || url.port_or_known_default() != allowed.port_or_known_default() {
        return None;
    }

    url.set_fragment(None);
    normalize_separators(&mut url);
    Some(url)
}

/// Rewrite the portal's legacy `;` field separators inside the query to `&`.
pub fn normalize_separators(url: &mut Url) {
    if let Some(query) = url.query() {
        if query.contains(';') {
            let rewritten = query
                .split(';')
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&rewritten));
        }
    }
}

pub(crate) fn truncate_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
