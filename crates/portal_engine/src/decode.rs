use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use url::Url;

/// Portal markup converted to UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMarkup {
    pub text: String,
    pub encoding_label: &'static str,
    /// Malformed byte sequences were replaced with U+FFFD.
    pub lossy: bool,
}

/// Decode raw bytes: BOM -> Content-Type charset -> `chardetng` guess
/// hinted with the portal's top-level domain (older pages are served in
/// Central-European legacy encodings).
pub fn decode_markup(bytes: &[u8], content_type: Option<&str>, page: Option<&Url>) -> DecodedMarkup {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(label) = content_type.and_then(extract_charset) {
        if let Some(enc) = Encoding::for_label(label.as_bytes()) {
            return decode_with(bytes, enc);
        }
    }

    let tld = page
        .and_then(Url::host_str)
        .and_then(|host| host.rsplit('.').next())
        .filter(|tld| tld.len() == 2 && tld.bytes().all(|b| b.is_ascii_alphabetic()));
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(tld.map(str::as_bytes), true);
    decode_with(bytes, enc)
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim_matches([' ', '"', '\''].as_ref()).to_string())
        })
        .next()
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> DecodedMarkup {
    let (text, used, had_errors) = enc.decode(bytes);
    DecodedMarkup {
        text: text.into_owned(),
        encoding_label: used.name(),
        lossy: had_errors,
    }
}
