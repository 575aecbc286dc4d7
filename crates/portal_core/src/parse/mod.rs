//! HTML table parser: raw portal markup → [`ParsedPage`].
//!
//! Parsing never fails. Markup the parser does not understand produces an
//! empty page tagged [`ParseOutcome::Unrecognized`].

mod anchors;
mod detail;
mod dom;
mod listing;
mod pagination;

use portal_logging::portal_debug;
use scraper::Html;
use url::Url;

use crate::locale::{fold, mentions_empty_folder};
use crate::model::{ParseOutcome, ParsedPage};

pub use anchors::{find_download_anchor, has_download_marker, is_system_url, DOWNLOAD_KEY};

/// Parser bound to the portal base URL; every extracted reference must stay
/// on that host.
#[derive(Debug, Clone)]
pub struct TableParser {
    base: Url,
}

impl TableParser {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Parse markup whose own location is unknown.
    pub fn parse(&self, html: &str) -> ParsedPage {
        self.parse_inner(html, None)
    }

    /// Parse markup retrieved from `page_url`; relative references resolve
    /// against it and pagination is restricted to the same endpoint.
    pub fn parse_page(&self, html: &str, page_url: &Url) -> ParsedPage {
        self.parse_inner(html, Some(page_url))
    }

    fn parse_inner(&self, html: &str, page_url: Option<&Url>) -> ParsedPage {
        let doc = Html::parse_document(html);
        let resolve_base = page_url.unwrap_or(&self.base);

        if let Some(row) = detail::attachments_row(&doc) {
            portal_debug!("attachments row found, parsing as detail page");
            let entries = detail::parse_detail(row, resolve_base)
                .into_iter()
                .collect::<Vec<_>>();
            let outcome = if entries.is_empty() {
                ParseOutcome::Unrecognized
            } else {
                ParseOutcome::Detail
            };
            return ParsedPage {
                entries,
                subfolders: Vec::new(),
                pagination: Vec::new(),
                total_count: None,
                outcome,
            };
        }

        let mut header_seen = false;
        let mut page = ParsedPage::unrecognized();
        for recognizer in listing::RECOGNIZERS {
            let rows = listing::run_recognizer(recognizer, &doc, resolve_base);
            header_seen |= rows.header_seen;
            if rows.is_empty() {
                portal_debug!("recognizer {:?} yielded no rows", recognizer.kind);
                continue;
            }
            portal_debug!(
                "recognizer {:?} yielded {} entries and {} subfolders",
                recognizer.kind,
                rows.entries.len(),
                rows.subfolders.len()
            );
            page.entries = rows.entries;
            page.subfolders = rows.subfolders;
            page.outcome = ParseOutcome::Listing {
                recognizer: recognizer.kind,
            };
            break;
        }

        if page.outcome == ParseOutcome::Unrecognized
            && (header_seen || mentions_empty_folder(&fold(&dom::text_of(doc.root_element()))))
        {
            page.outcome = ParseOutcome::Empty;
        }

        page.pagination = pagination::pagination_references(&doc, resolve_base, page_url);
        page.total_count = pagination::total_count(&doc);
        page
    }
}
