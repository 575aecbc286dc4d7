use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use url::Url;

use super::dom::{descendants_named, text_of};
use crate::sanitize::validate_url;

static RANGE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*[-–—]\s*(\d+)\s*$").unwrap());

/// "11-20 z 57", "11 – 20 of 57", "1-10 zo 12"
static TOTAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*[-–—]\s*(\d+)\s+(?:z|ze|zo|of|from)\s+(\d+)\b").unwrap()
});

/// Sibling-page references: anchors labelled with a record range that point
/// at the same listing endpoint as `page_url` (any in-portal endpoint when
/// the page location is unknown). Insertion-ordered, without duplicates.
pub(crate) fn pagination_references(doc: &Html, base: &Url, page_url: Option<&Url>) -> Vec<String> {
    let mut references: Vec<String> = Vec::new();
    for anchor in descendants_named(doc.root_element(), "a") {
        if !is_range_label(&text_of(anchor)) {
            continue;
        }
        let Some(url) = anchor
            .value()
            .attr("href")
            .and_then(|href| validate_url(href, base))
        else {
            continue;
        };
        if let Some(page) = page_url {
            if url.path() != page.path() || url.as_str() == page.as_str() {
                continue;
            }
        }
        let reference = String::from(url);
        if !references.contains(&reference) {
            references.push(reference);
        }
    }
    references
}

/// Total record count announced in the page's visible text, if any.
pub(crate) fn total_count(doc: &Html) -> Option<u32> {
    let text = text_of(body_or_root(doc));
    TOTAL_PATTERN.captures_iter(&text).find_map(|caps| {
        let from: u32 = caps.get(1)?.as_str().parse().ok()?;
        let to: u32 = caps.get(2)?.as_str().parse().ok()?;
        let total: u32 = caps.get(3)?.as_str().parse().ok()?;
        (from <= to && to <= total).then_some(total)
    })
}

fn is_range_label(label: &str) -> bool {
    RANGE_LABEL.captures(label).is_some_and(|caps| {
        let from = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        let to = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
        matches!((from, to), (Some(from), Some(to)) if from <= to)
    })
}

fn body_or_root(doc: &Html) -> ElementRef<'_> {
    descendants_named(doc.root_element(), "body")
        .next()
        .unwrap_or_else(|| doc.root_element())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_labels_need_ordered_bounds() {
        assert!(is_range_label(" 11-20 "));
        assert!(is_range_label("21 – 30"));
        assert!(!is_range_label("20-11"));
        assert!(!is_range_label("Přednáška 1-2"));
    }

    #[test]
    fn totals_are_read_in_each_locale() {
        let cs = Html::parse_document("<p>Záznamy 1–10 z 57</p>");
        let en = Html::parse_document("<p>Showing 11-20 of 42 records</p>");
        let bogus = Html::parse_document("<p>30-40 z 12</p>");
        assert_eq!(total_count(&cs), Some(57));
        assert_eq!(total_count(&en), Some(42));
        assert_eq!(total_count(&bogus), None);
    }
}
