//! Folder listings.
//!
//! Row discovery is a ranked list of [`Recognizer`]s. Each one picks
//! candidate tables out of the document; the first recognizer whose tables
//! produce at least one entry or subfolder wins.

use scraper::{ElementRef, Html};
use url::Url;

use super::anchors::collect_roles;
use super::dom::{
    all_elements, cells, contains_table, descendants_named, has_ancestor_named,
    has_class_containing, has_class_prefixed, is_header_row, own_rows, tag_is, text_of,
};
use crate::locale::{fold, Field};
use crate::model::{DocumentEntry, FolderLink, RecognizerKind};
use crate::sanitize::{
    sanitize_text, MAX_AUTHOR_LEN, MAX_COMMENT_LEN, MAX_DATE_LEN, MAX_NAME_LEN,
};

pub(crate) const MIN_ROW_CELLS: usize = 3;

/// Class/id fragments of tables that hold the file list.
const DATA_TABLE_CLASSES: &[&str] = &["soubory", "files", "seznam", "data", "dokumenty"];

/// Class/id prefixes of navigation chrome.
const CHROME_CLASSES: &[&str] = &[
    "nav", "menu", "breadcrumb", "drobecky", "lista", "header", "footer", "layout", "kalendar",
    "calendar", "paticka", "hlavicka",
];

/// First-cell class fragments of a leading checkbox/row-number column.
const MARKER_COLUMN_CLASSES: &[&str] = &[
    "checkbox", "check", "oznac", "poradi", "cislo", "row-number", "rownum", "number",
];

/// A structural recognizer: picks candidate tables from a document.
pub(crate) struct Recognizer {
    pub(crate) kind: RecognizerKind,
    pub(crate) candidates: for<'a> fn(&'a Html) -> Vec<ElementRef<'a>>,
}

/// Recognizers in the order they are tried.
pub(crate) const RECOGNIZERS: &[Recognizer] = &[
    Recognizer {
        kind: RecognizerKind::ClassedTable,
        candidates: classed_tables,
    },
    Recognizer {
        kind: RecognizerKind::HeaderTable,
        candidates: header_tables,
    },
    Recognizer {
        kind: RecognizerKind::AnyTable,
        candidates: any_tables,
    },
];

/// Result of running one recognizer.
#[derive(Debug, Default)]
pub(crate) struct ListingRows {
    pub(crate) entries: Vec<DocumentEntry>,
    pub(crate) subfolders: Vec<FolderLink>,
    /// A candidate table carried a recognized header, so the structure was
    /// understood even if no row survived.
    pub(crate) header_seen: bool,
}

impl ListingRows {
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.subfolders.is_empty()
    }
}

pub(crate) fn run_recognizer(recognizer: &Recognizer, doc: &Html, base: &Url) -> ListingRows {
    let mut out = ListingRows::default();
    for table in (recognizer.candidates)(doc) {
        extract_table(table, base, &mut out);
    }
    out
}

fn classed_tables(doc: &Html) -> Vec<ElementRef<'_>> {
    data_tables(doc)
        .filter(|table| has_class_containing(*table, DATA_TABLE_CLASSES))
        .collect()
}

fn header_tables(doc: &Html) -> Vec<ElementRef<'_>> {
    data_tables(doc)
        .filter(|table| {
            own_rows(*table)
                .into_iter()
                .find(|row| is_header_row(*row))
                .and_then(ColumnMap::from_header)
                .is_some()
        })
        .collect()
}

fn any_tables(doc: &Html) -> Vec<ElementRef<'_>> {
    data_tables(doc)
        .filter(|table| !contains_table(*table))
        .collect()
}

fn data_tables(doc: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    all_elements(doc).filter(|el| {
        tag_is(*el, "table")
            && !has_class_prefixed(*el, CHROME_CLASSES)
            && !has_ancestor_named(*el, &["nav", "header", "footer"])
    })
}

/// Column role → cell index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ColumnMap {
    pub(crate) subfolder: Option<usize>,
    pub(crate) name: Option<usize>,
    pub(crate) comment: Option<usize>,
    pub(crate) author: Option<usize>,
    pub(crate) date: Option<usize>,
    /// Number of header cells, `None` for the positional fallback.
    header_width: Option<usize>,
}

impl ColumnMap {
    /// Fixed offsets used when no header is recognized.
    pub(crate) const POSITIONAL: ColumnMap = ColumnMap {
        subfolder: Some(0),
        name: Some(1),
        comment: Some(2),
        author: Some(3),
        date: Some(4),
        header_width: None,
    };

    /// Map header cells to roles. `None` unless the name column is found.
    pub(crate) fn from_header(row: ElementRef<'_>) -> Option<ColumnMap> {
        let header_cells = cells(row);
        let mut map = ColumnMap {
            header_width: Some(header_cells.len()),
            ..ColumnMap::default()
        };
        for (idx, cell) in header_cells.iter().enumerate() {
            let folded = fold(&text_of(*cell));
            let slot = match Field::classify(&folded) {
                Some(Field::Subfolder) => &mut map.subfolder,
                Some(Field::Name) => &mut map.name,
                Some(Field::Comment) => &mut map.comment,
                Some(Field::Author) => &mut map.author,
                Some(Field::Date) => &mut map.date,
                None => continue,
            };
            if slot.is_none() {
                *slot = Some(idx);
            }
        }
        map.name.map(|_| map)
    }

    /// Every index moved one cell to the right.
    pub(crate) fn shifted(self) -> ColumnMap {
        let shift = |idx: Option<usize>| idx.map(|i| i + 1);
        ColumnMap {
            subfolder: shift(self.subfolder),
            name: shift(self.name),
            comment: shift(self.comment),
            author: shift(self.author),
            date: shift(self.date),
            header_width: self.header_width,
        }
    }

    /// Heuristic: a leading checkbox/row-number cell pushes the data one
    /// column right, unless the header already accounts for that column.
    fn for_row(self, row_cells: &[ElementRef<'_>]) -> ColumnMap {
        let leading_marker = row_cells.first().is_some_and(|cell| is_marker_cell(*cell));
        let header_covers_row = self
            .header_width
            .is_some_and(|width| width >= row_cells.len());
        if leading_marker && !header_covers_row {
            self.shifted()
        } else {
            self
        }
    }
}

pub(crate) fn is_marker_cell(cell: ElementRef<'_>) -> bool {
    let has_checkbox = descendants_named(cell, "input").any(|input| {
        input
            .value()
            .attr("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("checkbox"))
    });
    has_checkbox || has_class_containing(cell, MARKER_COLUMN_CLASSES)
}

fn extract_table(table: ElementRef<'_>, base: &Url, out: &mut ListingRows) {
    let rows = own_rows(table);
    let header = rows
        .iter()
        .find(|row| is_header_row(**row))
        .and_then(|row| ColumnMap::from_header(*row));
    if header.is_some() {
        out.header_seen = true;
    }
    let columns = header.unwrap_or(ColumnMap::POSITIONAL);

    for row in rows.into_iter().filter(|row| !is_header_row(*row)) {
        extract_row(row, columns, base, out);
    }
}

fn extract_row(row: ElementRef<'_>, columns: ColumnMap, base: &Url, out: &mut ListingRows) {
    let row_cells = cells(row);
    if row_cells.len() < MIN_ROW_CELLS {
        return;
    }
    let columns = columns.for_row(&row_cells);
    let cell_text = |idx: Option<usize>, max_len: usize| {
        idx.and_then(|i| row_cells.get(i))
            .map(|cell| sanitize_text(&text_of(*cell), max_len))
            .unwrap_or_default()
    };

    let (mut attachments, folders) = collect_roles(row, base);
    let mut name = cell_text(columns.name, MAX_NAME_LEN);

    if attachments.is_empty() {
        for mut folder in folders {
            if folder.name.is_empty() {
                folder.name = name.clone();
            }
            if !folder.name.is_empty() && !out.subfolders.iter().any(|f| f.reference == folder.reference) {
                out.subfolders.push(folder);
            }
        }
        return;
    }

    if name.is_empty() {
        name = attachments
            .iter()
            .map(|att| att.name.clone())
            .find(|n| !n.is_empty())
            .unwrap_or_default();
    }
    if name.is_empty() {
        return;
    }
    for attachment in attachments.iter_mut().filter(|att| att.name.is_empty()) {
        attachment.name = name.clone();
    }

    out.entries.push(DocumentEntry {
        subfolder: cell_text(columns.subfolder, MAX_NAME_LEN),
        name,
        comment: cell_text(columns.comment, MAX_COMMENT_LEN),
        author: cell_text(columns.author, MAX_AUTHOR_LEN),
        date: cell_text(columns.date, MAX_DATE_LEN),
        attachments,
    });
}
