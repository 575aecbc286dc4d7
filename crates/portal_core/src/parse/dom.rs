//! Small traversal helpers over `scraper`'s tree.

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};

pub(crate) fn tag_is(element: ElementRef<'_>, name: &str) -> bool {
    element.value().name().eq_ignore_ascii_case(name)
}

pub(crate) fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

/// Every element of the document in tree order.
pub(crate) fn all_elements(doc: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
}

pub(crate) fn descendants_named<'a>(
    element: ElementRef<'a>,
    name: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(move |el| tag_is(*el, name))
}

/// Rows that belong to this table, without descending into nested tables.
pub(crate) fn own_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in child_elements(table) {
        if tag_is(child, "tr") {
            rows.push(child);
        } else if tag_is(child, "thead") || tag_is(child, "tbody") || tag_is(child, "tfoot") {
            rows.extend(child_elements(child).filter(|el| tag_is(*el, "tr")));
        }
    }
    rows
}

pub(crate) fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    child_elements(row)
        .filter(|el| tag_is(*el, "td") || tag_is(*el, "th"))
        .collect()
}

pub(crate) fn is_header_row(row: ElementRef<'_>) -> bool {
    let in_thead = row
        .parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|parent| tag_is(parent, "thead"));
    let cells = cells(row);
    in_thead || (!cells.is_empty() && cells.iter().all(|cell| tag_is(*cell, "th")))
}

/// Visible text of an element with whitespace collapsed; script and style
/// content is skipped.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(*element, &mut out);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            out.push_str(text);
            out.push(' ');
        }
        Node::Element(element) => {
            if matches!(element.name(), "script" | "style" | "noscript" | "template") {
                return;
            }
            for child in node.children() {
                collect_text(child, out);
            }
        }
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

pub(crate) fn has_class_containing(element: ElementRef<'_>, needles: &[&str]) -> bool {
    let classes = element
        .value()
        .classes()
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>();
    let id = element.value().id().map(str::to_ascii_lowercase);
    needles.iter().any(|needle| {
        classes.iter().any(|class| class.contains(needle))
            || id.as_deref().is_some_and(|id| id.contains(needle))
    })
}

/// Like [`has_class_containing`], but a class or id only matches when it
/// starts with one of the needles.
pub(crate) fn has_class_prefixed(element: ElementRef<'_>, prefixes: &[&str]) -> bool {
    let id = element.value().id().map(str::to_ascii_lowercase);
    element
        .value()
        .classes()
        .map(str::to_ascii_lowercase)
        .chain(id)
        .any(|name| prefixes.iter().any(|prefix| name.starts_with(prefix)))
}

pub(crate) fn has_ancestor_named(element: ElementRef<'_>, names: &[&str]) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| names.iter().any(|name| tag_is(ancestor, name)))
}

pub(crate) fn contains_table(element: ElementRef<'_>) -> bool {
    descendants_named(element, "table").next().is_some()
}
