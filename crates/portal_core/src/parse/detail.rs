//! Single-document detail pages: a two-column label/value table with an
//! "Attachments" row.

use scraper::{ElementRef, Html};
use url::Url;

use super::anchors::{classify_anchor, marker_near, AnchorRole, Marker};
use super::dom::{all_elements, cells, descendants_named, tag_is, text_of};
use crate::locale::{fold, is_attachments_label, Field};
use crate::model::{Attachment, DocumentEntry, MediaKind};
use crate::sanitize::{
    sanitize_text, validate_file_name, validate_url, MAX_AUTHOR_LEN, MAX_COMMENT_LEN,
    MAX_DATE_LEN, MAX_NAME_LEN,
};

/// The row whose label cell names the attachments, if the page has one.
pub(crate) fn attachments_row(doc: &Html) -> Option<ElementRef<'_>> {
    all_elements(doc)
        .filter(|el| tag_is(*el, "tr"))
        .find(|row| {
            cells(*row)
                .first()
                .is_some_and(|label| is_attachments_label(&fold(&text_of(*label))))
        })
}

/// Build the single entry of a detail page. `None` when the attachments row
/// holds no usable anchor or no name can be found.
pub(crate) fn parse_detail(row: ElementRef<'_>, base: &Url) -> Option<DocumentEntry> {
    let attachment = first_attachment(row, base)?;
    let metadata = collect_metadata(row);

    let name = if metadata.name.is_empty() {
        attachment.name.clone()
    } else {
        metadata.name
    };
    if name.is_empty() {
        return None;
    }

    let attachment = Attachment {
        name: if attachment.name.is_empty() {
            name.clone()
        } else {
            attachment.name
        },
        ..attachment
    };

    Some(DocumentEntry {
        subfolder: String::new(),
        name,
        comment: metadata.comment,
        author: metadata.author,
        date: metadata.date,
        attachments: vec![attachment],
    })
}

fn first_attachment(row: ElementRef<'_>, base: &Url) -> Option<Attachment> {
    let value_cells = cells(row).into_iter().skip(1);
    let anchor = value_cells
        .flat_map(|cell| descendants_named(cell, "a").collect::<Vec<_>>())
        .find(|anchor| {
            anchor
                .value()
                .attr("href")
                .and_then(|href| validate_url(href, base))
                .is_some()
        })?;
    let url = validate_url(anchor.value().attr("href")?, base)?;

    let kind = match classify_anchor(anchor, base) {
        Some(AnchorRole::Attachment(att)) => att.kind,
        _ => match marker_near(anchor) {
            Some(Marker::Document(kind)) => kind,
            _ => MediaKind::Unknown,
        },
    };
    let label = sanitize_text(&text_of(anchor), MAX_NAME_LEN);
    let name = if label.is_empty() {
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(validate_file_name)
            .unwrap_or_default()
    } else {
        label
    };

    Some(Attachment {
        name,
        kind,
        reference: url.into(),
    })
}

#[derive(Default)]
struct Metadata {
    name: String,
    author: String,
    date: String,
    comment: String,
}

/// Label→value pairs from the rows sharing a table with the attachments row.
fn collect_metadata(attachments_row: ElementRef<'_>) -> Metadata {
    let mut metadata = Metadata::default();
    let Some(table) = attachments_row
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| tag_is(*el, "table"))
    else {
        return metadata;
    };

    for row in descendants_named(table, "tr") {
        let row_cells = cells(row);
        let [label, value, ..] = row_cells.as_slice() else {
            continue;
        };
        let folded = fold(&text_of(*label));
        let text = text_of(*value);
        match Field::classify(&folded) {
            Some(Field::Name) if metadata.name.is_empty() => {
                metadata.name = sanitize_text(&text, MAX_NAME_LEN)
            }
            Some(Field::Author) if metadata.author.is_empty() => {
                metadata.author = sanitize_text(&text, MAX_AUTHOR_LEN)
            }
            Some(Field::Date) if metadata.date.is_empty() => {
                metadata.date = sanitize_text(&text, MAX_DATE_LEN)
            }
            Some(Field::Comment) if metadata.comment.is_empty() => {
                metadata.comment = sanitize_text(&text, MAX_COMMENT_LEN)
            }
            _ => {}
        }
    }
    metadata
}
