use std::sync::Arc;

use portal_core::{find_download_anchor, has_download_marker, validate_url, MediaKind, DOWNLOAD_KEY};
use portal_logging::{portal_debug, portal_warn};
use url::Url;

use crate::decode::decode_markup;
use crate::filename::{filename_from_disposition, generated_filename};
use crate::transport::Transport;
use crate::{FailureKind, TransportError, TransportResponse};

const VIEW_KEY: &str = "view";
const VERSION_KEY: &str = "vid";
const DOWNLOAD_ENDPOINT: &str = "/auth/dok/rfmgr.pl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// A recognized document format (pdf, office, archive, ...).
    Document,
    Binary,
    /// The portal answered with a web page where a file was expected.
    HtmlUnexpected,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Document => "document",
            ContentKind::Binary => "binary",
            ContentKind::HtmlUnexpected => "html",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    pub uri: String,
    pub kind: ContentKind,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready {
        location: ResolvedLocation,
        body: Vec<u8>,
    },
    /// Hand the reference to a browser that carries the user's session.
    OpenExternally(ResolvedLocation),
    RetrievalFailed {
        location: ResolvedLocation,
        failure: TransportError,
    },
}

impl Resolution {
    pub fn location(&self) -> &ResolvedLocation {
        match self {
            Resolution::Ready { location, .. }
            | Resolution::OpenExternally(location)
            | Resolution::RetrievalFailed { location, .. } => location,
        }
    }
}

/// Turns an attachment reference into something directly retrievable.
#[derive(Clone)]
pub struct LinkResolver {
    base: Url,
    transport: Arc<dyn Transport>,
}

impl LinkResolver {
    pub fn new(base: Url, transport: Arc<dyn Transport>) -> Self {
        Self { base, transport }
    }

    /// Absolutize against the portal base, rewrite legacy separators and turn
    /// a two-identifier view reference into its download form. No I/O.
    pub fn normalize(&self, reference: &str) -> Option<Url> {
        let url = validate_url(reference, &self.base)?;
        Some(self.rewrite_view(&url).unwrap_or(url))
    }

    fn rewrite_view(&self, url: &Url) -> Option<Url> {
        let mut doc = None;
        let mut version = None;
        for (key, value) in url.query_pairs() {
            let numeric = !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit());
            if key == VIEW_KEY && numeric {
                doc = Some(value.into_owned());
            } else if key == VERSION_KEY && numeric {
                version = Some(value.into_owned());
            }
        }
        let (doc, version) = (doc?, version?);
        let mut target = self.base.join(DOWNLOAD_ENDPOINT).ok()?;
        target
            .query_pairs_mut()
            .clear()
            .append_pair(DOWNLOAD_KEY, &doc)
            .append_pair(VERSION_KEY, &version);
        Some(target)
    }

    /// Resolve `reference` with at most one intermediate page and one
    /// terminal retrieval. Never fails; the outcome says what happened.
    pub async fn resolve(&self, reference: &str) -> Resolution {
        let Some(start) = self.normalize(reference) else {
            portal_debug!("reference {reference} is not a portal url");
            let location = ResolvedLocation {
                uri: reference.to_string(),
                kind: ContentKind::HtmlUnexpected,
                file_name: generated_filename(reference, None),
            };
            return Resolution::RetrievalFailed {
                location,
                failure: TransportError::new(FailureKind::InvalidUrl, reference),
            };
        };

        let target = if has_download_marker(&start) {
            start
        } else {
            match self.transport.retrieve(start.as_str()).await {
                Ok(response) if !response.is_html() => {
                    return self.ready(start.as_str(), response);
                }
                Ok(response) => match self.download_anchor(&response) {
                    Some(found) => {
                        portal_debug!("hop {} -> {}", start, found);
                        found
                    }
                    None => {
                        portal_debug!("no download anchor on {start}; keeping reference");
                        return Resolution::OpenExternally(html_location(start.as_str()));
                    }
                },
                // The hop request targets the same URI the unhopped retrieval would.
                Err(failure) => {
                    portal_warn!("intermediate retrieval of {start} failed: {failure}");
                    return Resolution::RetrievalFailed {
                        location: html_location(start.as_str()),
                        failure,
                    };
                }
            }
        };

        match self.transport.retrieve(target.as_str()).await {
            Ok(response) if response.is_html() => {
                portal_debug!("{target} answered with html");
                Resolution::OpenExternally(html_location(target.as_str()))
            }
            Ok(response) => self.ready(target.as_str(), response),
            Err(failure) => {
                portal_warn!("retrieval of {target} failed: {failure}");
                Resolution::RetrievalFailed {
                    location: html_location(target.as_str()),
                    failure,
                }
            }
        }
    }

    fn download_anchor(&self, response: &TransportResponse) -> Option<Url> {
        let page = Url::parse(&response.final_uri).ok();
        let decoded = decode_markup(&response.body, response.content_type(), page.as_ref());
        let found = find_download_anchor(&decoded.text, page.as_ref().unwrap_or(&self.base))?;
        // Anchors on a redirected page must still point back into the portal.
        validate_url(found.as_str(), &self.base)
    }

    fn ready(&self, requested: &str, response: TransportResponse) -> Resolution {
        let uri = if response.final_uri.is_empty() {
            requested.to_string()
        } else {
            response.final_uri.clone()
        };
        let file_name = response
            .header("content-disposition")
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| generated_filename(&uri, response.content_type()));
        let location = ResolvedLocation {
            kind: content_kind(response.content_type(), &file_name),
            uri,
            file_name,
        };
        Resolution::Ready {
            location,
            body: response.body,
        }
    }
}

fn html_location(uri: &str) -> ResolvedLocation {
    ResolvedLocation {
        uri: uri.to_string(),
        kind: ContentKind::HtmlUnexpected,
        file_name: generated_filename(uri, Some("text/html")),
    }
}

fn content_kind(content_type: Option<&str>, file_name: &str) -> ContentKind {
    let from_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().to_ascii_lowercase())
        .filter(|essence| essence != "application/octet-stream")
        .and_then(|essence| mime_guess::get_mime_extensions_str(&essence))
        .and_then(|exts| exts.iter().find_map(|ext| MediaKind::from_token(ext)));
    let from_name = file_name
        .rsplit_once('.')
        .and_then(|(_, ext)| MediaKind::from_token(ext));
    match from_type.or(from_name) {
        Some(kind) if kind.is_known() && kind != MediaKind::Html => ContentKind::Document,
        _ => ContentKind::Binary,
    }
}
