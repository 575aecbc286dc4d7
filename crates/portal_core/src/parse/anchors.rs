//! Anchor discovery and classification shared by the listing and detail
//! branches and by the resolver's intermediate hop.

use scraper::{ElementRef, Html};
use url::Url;

use super::dom::{child_elements, descendants_named, tag_is, text_of};
use crate::locale::{fold, is_non_document_label};
use crate::model::{Attachment, FolderLink, MediaKind};
use crate::sanitize::{sanitize_text, validate_file_name, validate_url, MAX_NAME_LEN};

/// Query key carried by every direct-download reference.
pub const DOWNLOAD_KEY: &str = "download";

const FOLDER_TOKENS: &[&str] = &["slozka", "folder", "dir", "adresar", "priecinok"];

/// Path fragments of portal pages that are never documents.
const SYSTEM_PATH_PATTERNS: &[&str] = &[
    "/osoba/",
    "/lide/",
    "/people/",
    "/hledat",
    "/vyhledavani",
    "/search",
    "/nastaveni",
    "/settings",
    "/moje_slozky",
    "/my_folders",
    "/logout",
    "/odhlasit",
    "/nahled",
    "/preview",
];

/// Query keys of portal pages that are never documents.
const SYSTEM_QUERY_KEYS: &[&str] = &[
    "info", "nahled", "preview", "lang", "osoba", "hledat", "search", "nastaveni", "settings",
];

/// Type marker found next to an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Marker {
    Document(MediaKind),
    Folder,
}

/// What a single anchor in a row turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AnchorRole {
    Attachment(Attachment),
    Folder(FolderLink),
}

pub fn has_download_marker(url: &Url) -> bool {
    url.query_pairs()
        .any(|(key, _)| key.eq_ignore_ascii_case(DOWNLOAD_KEY))
}

/// True for person profiles, info/preview endpoints, search, settings and
/// similar portal chrome.
pub fn is_system_url(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    if SYSTEM_PATH_PATTERNS.iter().any(|pattern| path.contains(pattern)) {
        return true;
    }
    url.query_pairs().any(|(key, _)| {
        SYSTEM_QUERY_KEYS
            .iter()
            .any(|system| key.eq_ignore_ascii_case(system))
    })
}

/// Classify every anchor inside `scope` and return the document and folder
/// references in document order, deduplicated by validated reference.
pub(crate) fn collect_roles(scope: ElementRef<'_>, base: &Url) -> (Vec<Attachment>, Vec<FolderLink>) {
    let mut attachments: Vec<Attachment> = Vec::new();
    let mut folders: Vec<FolderLink> = Vec::new();

    for anchor in descendants_named(scope, "a") {
        match classify_anchor(anchor, base) {
            Some(AnchorRole::Attachment(attachment)) => merge_attachment(&mut attachments, attachment),
            Some(AnchorRole::Folder(folder)) => {
                if !folders.iter().any(|f| f.reference == folder.reference) {
                    folders.push(folder);
                }
            }
            None => {}
        }
    }
    (attachments, folders)
}

/// Keep the first occurrence of a reference; a later occurrence only
/// contributes a media kind the first one lacked.
pub(crate) fn merge_attachment(attachments: &mut Vec<Attachment>, candidate: Attachment) {
    match attachments
        .iter_mut()
        .find(|existing| existing.reference == candidate.reference)
    {
        Some(existing) => {
            if !existing.kind.is_known() && candidate.kind.is_known() {
                existing.kind = candidate.kind;
            }
        }
        None => attachments.push(candidate),
    }
}

pub(crate) fn classify_anchor(anchor: ElementRef<'_>, base: &Url) -> Option<AnchorRole> {
    let url = validate_url(anchor.value().attr("href")?, base)?;
    let label = sanitize_text(&text_of(anchor), MAX_NAME_LEN);
    let folded_label = fold(&label);
    if is_system_url(&url) || is_non_document_label(&folded_label) {
        return None;
    }

    let marker = marker_near(anchor);
    let download = has_download_marker(&url);
    if marker == Some(Marker::Folder) && !download {
        return Some(AnchorRole::Folder(FolderLink {
            name: label,
            reference: url.into(),
        }));
    }

    let extension_kind = extension_kind(&url);
    let kind = match marker {
        Some(Marker::Document(kind)) => Some(kind),
        _ => extension_kind,
    };

    if download || kind.is_some() {
        let name = attachment_name(&label, &url);
        return Some(AnchorRole::Attachment(Attachment {
            name,
            kind: kind.unwrap_or(MediaKind::Unknown),
            reference: url.into(),
        }));
    }

    if url.path().ends_with('/') && !label.is_empty() {
        return Some(AnchorRole::Folder(FolderLink {
            name: label,
            reference: url.into(),
        }));
    }
    None
}

/// First anchor of a retrieved page that carries the download marker and sits
/// next to a document-type icon.
pub fn find_download_anchor(html: &str, base: &Url) -> Option<Url> {
    let doc = Html::parse_document(html);
    let found = descendants_named(doc.root_element(), "a").find_map(|anchor| {
        let url = validate_url(anchor.value().attr("href")?, base)?;
        if !has_download_marker(&url) || is_system_url(&url) {
            return None;
        }
        match marker_near(anchor) {
            Some(Marker::Document(_)) => Some(url),
            _ => None,
        }
    });
    found
}

/// Look for a type marker on the anchor, inside it, on its immediate element
/// siblings, or anywhere in its cell when the cell holds this anchor only.
pub(crate) fn marker_near(anchor: ElementRef<'_>) -> Option<Marker> {
    if let Some(marker) = marker_of(anchor) {
        return Some(marker);
    }
    if let Some(marker) = anchor
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find_map(marker_of)
    {
        return Some(marker);
    }

    let previous = anchor.prev_siblings().find_map(ElementRef::wrap);
    let next = anchor.next_siblings().find_map(ElementRef::wrap);
    for sibling in [previous, next].into_iter().flatten() {
        if tag_is(sibling, "a") {
            continue;
        }
        if let Some(marker) = marker_of(sibling).or_else(|| {
            sibling
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .find_map(marker_of)
        }) {
            return Some(marker);
        }
    }

    let cell = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| tag_is(*el, "td") || tag_is(*el, "th") || tag_is(*el, "li"))?;
    if descendants_named(cell, "a").count() != 1 {
        return None;
    }
    child_elements(cell)
        .flat_map(|child| std::iter::once(*child).chain(child.descendants().skip(1)))
        .filter_map(ElementRef::wrap)
        .find_map(marker_of)
}

fn marker_of(element: ElementRef<'_>) -> Option<Marker> {
    let value = element.value();
    let mut tokens: Vec<String> = Vec::new();
    if let Some(sysid) = value.attr("sysid") {
        tokens.push(sysid.to_string());
    }
    if let Some(mime) = value.attr("data-mime") {
        tokens.push(mime.to_string());
    }
    tokens.extend(
        value
            .classes()
            .filter(|class| {
                let lower = class.to_ascii_lowercase();
                lower.starts_with("mime-") || lower.starts_with("ikona-") || lower.starts_with("icon-")
            })
            .map(str::to_string),
    );
    if tag_is(element, "img") {
        if let Some(stem) = value.attr("src").and_then(icon_stem) {
            tokens.push(stem);
        }
    }

    tokens.iter().find_map(|token| token_marker(token))
}

fn token_marker(token: &str) -> Option<Marker> {
    let lower = token.to_ascii_lowercase();
    let tail = lower.rsplit(['-', '/']).next().unwrap_or(lower.as_str());
    if FOLDER_TOKENS.contains(&tail) {
        return Some(Marker::Folder);
    }
    MediaKind::from_token(tail).map(Marker::Document)
}

/// `/pics/mime/pdf.svg` -> `pdf`
fn icon_stem(src: &str) -> Option<String> {
    let file = src.split(['?', '#']).next()?.rsplit('/').next()?;
    let stem = file.split('.').next()?;
    (!stem.is_empty()).then(|| stem.to_string())
}

fn extension_kind(url: &Url) -> Option<MediaKind> {
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.eq_ignore_ascii_case("pl") || ext.eq_ignore_ascii_case("php") {
        return None;
    }
    MediaKind::from_token(ext).filter(|kind| *kind != MediaKind::Html)
}

fn attachment_name(label: &str, url: &Url) -> String {
    if !label.is_empty() {
        return label.to_string();
    }
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty() && last.contains('.'))
        .and_then(validate_file_name)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://is.example.cz/").unwrap()
    }

    fn first_anchor_role(html: &str) -> Option<AnchorRole> {
        let doc = Html::parse_fragment(html);
        let anchor = descendants_named(doc.root_element(), "a").next().unwrap();
        classify_anchor(anchor, &base())
    }

    #[test]
    fn download_link_with_icon_inside_is_attachment() {
        let role = first_anchor_role(
            r#"<table><tr><td><a href="/auth/el/um/?download=5"><img sysid="mime-pdf"></a></td></tr></table>"#,
        );
        match role {
            Some(AnchorRole::Attachment(att)) => {
                assert_eq!(att.kind, MediaKind::Pdf);
                assert!(att.reference.contains("download=5"));
            }
            other => panic!("unexpected role {other:?}"),
        }
    }

    #[test]
    fn profile_and_info_links_are_dropped() {
        assert_eq!(first_anchor_role(r#"<a href="/auth/osoba/123">Jan Novák</a>"#), None);
        assert_eq!(
            first_anchor_role(r#"<a href="/auth/el/um/?info=9"><img sysid="mime-pdf"></a>"#),
            None
        );
        assert_eq!(first_anchor_role(r#"<a href="/auth/el/um/x/?download=1">Nastavení</a>"#), None);
    }

    #[test]
    fn folder_icon_marks_subfolder() {
        let role = first_anchor_role(
            r#"<table><tr><td><img class="ikona-slozka"><a href="/auth/el/um/cviceni/">Cvičení</a></td></tr></table>"#,
        );
        assert_eq!(
            role,
            Some(AnchorRole::Folder(FolderLink {
                name: "Cvičení".into(),
                reference: "https://is.example.cz/auth/el/um/cviceni/".into(),
            }))
        );
    }

    #[test]
    fn download_anchor_is_found_on_a_retrieved_page() {
        let page = r#"<html><body>
            <a href="/auth/osoba/1">Jana Nováková</a>
            <a href="/auth/dok/rfmgr.pl?download=9"><img src="/pics/mime/pdf.svg"></a>
        </body></html>"#;
        let found = find_download_anchor(page, &base()).unwrap();
        assert_eq!(found.as_str(), "https://is.example.cz/auth/dok/rfmgr.pl?download=9");
        assert_eq!(find_download_anchor("<p>nic</p>", &base()), None);
    }

    #[test]
    fn icon_stem_reads_file_stem() {
        assert_eq!(icon_stem("/pics/mime/pdf.svg?v=2").as_deref(), Some("pdf"));
        assert_eq!(icon_stem("/"), None);
    }

    #[test]
    fn later_kind_fills_unknown() {
        let mut list = vec![Attachment {
            name: "a".into(),
            kind: MediaKind::Unknown,
            reference: "r".into(),
        }];
        merge_attachment(
            &mut list,
            Attachment {
                name: "b".into(),
                kind: MediaKind::Pdf,
                reference: "r".into(),
            },
        );
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, MediaKind::Pdf);
        assert_eq!(list[0].name, "a");
    }
}
