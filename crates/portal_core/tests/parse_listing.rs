use portal_core::{MediaKind, ParseOutcome, RecognizerKind, TableParser};
use pretty_assertions::assert_eq;
use url::Url;

const BASE: &str = "https://is.example.cz/";

fn parser() -> TableParser {
    portal_logging::initialize_for_tests();
    TableParser::new(Url::parse(BASE).unwrap())
}

fn scenario_row() -> &'static str {
    r#"<tr>
        <td>Ostatní</td>
        <td>Přednáška 92 — abstraktní datové typy moduly</td>
        <td></td>
        <td><a href="/auth/osoba/4821">Jana Nováková</a></td>
        <td>29. 1. 2026</td>
        <td><a href="/auth/el/fi/jaro2026/ALG/um/?info=1"><img sysid="mime-info"></a></td>
        <td><a href="/auth/el/fi/jaro2026/ALG/um/?info=2">Info</a></td>
        <td><a href="/auth/el/fi/jaro2026/ALG/um/?download=9912"><img sysid="mime-pdf" alt=""></a></td>
    </tr>"#
}

#[test]
fn portal_row_yields_single_pdf_attachment() {
    let html = format!(
        r#"<html><body><table class="soubory"><tbody>{}</tbody></table></body></html>"#,
        scenario_row()
    );
    let page = parser().parse(&html);

    assert_eq!(page.entries.len(), 1);
    let entry = &page.entries[0];
    assert_eq!(entry.subfolder, "Ostatní");
    assert_eq!(entry.name, "Přednáška 92 — abstraktní datové typy moduly");
    assert_eq!(entry.comment, "");
    assert_eq!(entry.author, "Jana Nováková");
    assert_eq!(entry.date, "29. 1. 2026");
    assert_eq!(entry.attachments.len(), 1);
    assert!(entry.attachments[0].reference.contains("download="));
    assert_eq!(entry.attachments[0].kind, MediaKind::Pdf);
    assert_eq!(entry.attachments[0].kind.as_str(), "pdf");
    assert_eq!(entry.attachments[0].name, entry.name);
    assert_eq!(
        page.outcome,
        ParseOutcome::Listing {
            recognizer: RecognizerKind::ClassedTable
        }
    );
}

#[test]
fn rows_with_only_navigational_anchors_are_dropped() {
    let html = r#"<table class="soubory">
        <tr>
            <td>Složka</td>
            <td><a href="/auth/el/fi/jaro2026/ALG/um/../">..</a></td>
            <td><a href="/auth/osoba/1">Autor</a></td>
            <td><a href="/auth/el/fi/jaro2026/ALG/um/?info=4">Informace</a></td>
            <td><a href="/auth/hledat/">Hledat</a></td>
        </tr>
        <tr>
            <td></td>
            <td>Skripta</td>
            <td></td>
            <td></td>
            <td>1. 2. 2026</td>
            <td><a href="/auth/el/fi/jaro2026/ALG/um/?download=1">skripta.pdf</a></td>
        </tr>
    </table>"#;
    let page = parser().parse(html);

    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].name, "Skripta");
    assert!(page.entries.iter().all(|entry| !entry.attachments.is_empty()));
}

#[test]
fn duplicate_references_merge_into_one_attachment() {
    let html = r#"<table class="soubory"><tr>
        <td></td>
        <td><a href="/auth/el/um/?download=7">Zadání</a></td>
        <td></td><td></td><td></td>
        <td><a href="/auth/el/um/?download=7#x"><img sysid="mime-docx"></a></td>
        <td><a href="/auth/el/um/?download=8"><img sysid="mime-pdf"></a></td>
    </tr></table>"#;
    let page = parser().parse(html);

    let attachments = &page.entries[0].attachments;
    assert_eq!(attachments.len(), 2);
    assert_eq!(attachments[0].name, "Zadání");
    assert_eq!(attachments[0].kind, MediaKind::Word);
    assert_eq!(
        attachments[0].reference,
        "https://is.example.cz/auth/el/um/?download=7"
    );
    assert_eq!(attachments[1].kind, MediaKind::Pdf);
}

#[test]
fn header_keywords_override_positional_offsets() {
    let html = r#"<table>
        <thead><tr><th>Name</th><th>Last modified</th><th>Author</th><th>Comment</th></tr></thead>
        <tbody><tr>
            <td><a href="/auth/el/um/?download=3"><img class="mime-zip">Sources</a></td>
            <td>3 Feb 2026</td>
            <td>J. Smith</td>
            <td>lab code</td>
        </tr></tbody>
    </table>"#;
    let page = parser().parse(html);

    assert_eq!(
        page.outcome,
        ParseOutcome::Listing {
            recognizer: RecognizerKind::HeaderTable
        }
    );
    let entry = &page.entries[0];
    assert_eq!(entry.name, "Sources");
    assert_eq!(entry.date, "3 Feb 2026");
    assert_eq!(entry.author, "J. Smith");
    assert_eq!(entry.comment, "lab code");
    assert_eq!(entry.subfolder, "");
    assert_eq!(entry.attachments[0].kind, MediaKind::Archive);
}

#[test]
fn leading_checkbox_column_shifts_positional_indices() {
    let html = r#"<table><tr>
        <td><input type="checkbox" name="sel"></td>
        <td>Cvičení</td>
        <td>Úloha 3</td>
        <td>odevzdat do pátku</td>
        <td>Petr Král</td>
        <td>4. 3. 2026</td>
        <td><a href="/auth/el/um/?download=30"><img sysid="mime-pdf"></a></td>
    </tr></table>"#;
    let page = parser().parse(html);

    let entry = &page.entries[0];
    assert_eq!(entry.subfolder, "Cvičení");
    assert_eq!(entry.name, "Úloha 3");
    assert_eq!(entry.comment, "odevzdat do pátku");
    assert_eq!(entry.author, "Petr Král");
    assert_eq!(entry.date, "4. 3. 2026");
    assert_eq!(
        page.outcome,
        ParseOutcome::Listing {
            recognizer: RecognizerKind::AnyTable
        }
    );
}

#[test]
fn subfolder_rows_are_reported_separately() {
    let html = r#"<table class="soubory">
        <tr><td><img sysid="mime-slozka"></td><td><a href="/auth/el/um/cviceni/">Cvičení</a></td><td></td></tr>
        <tr><td></td><td>Sylabus</td><td></td><td></td><td></td><td><a href="/auth/el/um/?download=2">s.pdf</a></td></tr>
    </table>"#;
    let page = parser().parse(html);

    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.subfolders.len(), 1);
    assert_eq!(page.subfolders[0].name, "Cvičení");
    assert_eq!(
        page.subfolders[0].reference,
        "https://is.example.cz/auth/el/um/cviceni/"
    );
}

#[test]
fn pagination_and_total_are_collected() {
    let page_url = Url::parse("https://is.example.cz/auth/el/um/").unwrap();
    let html = r#"<body>
        <table class="soubory"><tr><td></td><td>A</td><td></td><td></td><td></td>
        <td><a href="?download=1">a.pdf</a></td></tr></table>
        <p>Záznamy 1–10 z 25</p>
        <a href="/auth/el/um/?offset=10">11-20</a>
        <a href="/auth/el/um/?offset=20">21-25</a>
        <a href="/auth/el/um/?offset=10">11-20</a>
        <a href="/auth/jine/?offset=10">11-20</a>
    </body>"#;
    let page = parser().parse_page(html, &page_url);

    assert_eq!(
        page.pagination,
        vec![
            "https://is.example.cz/auth/el/um/?offset=10".to_string(),
            "https://is.example.cz/auth/el/um/?offset=20".to_string(),
        ]
    );
    assert_eq!(page.total_count, Some(25));
    assert_eq!(
        page.entries[0].attachments[0].reference,
        "https://is.example.cz/auth/el/um/?download=1"
    );
}

#[test]
fn empty_folder_and_unknown_markup_are_told_apart() {
    let empty = r#"<table><thead><tr><th>Název</th><th>Autor</th></tr></thead><tbody></tbody></table>"#;
    let unknown = r#"<div><p>Nothing table-like here</p></div>"#;

    let empty_page = parser().parse(empty);
    let unknown_page = parser().parse(unknown);

    assert!(empty_page.entries.is_empty());
    assert!(unknown_page.entries.is_empty());
    assert_eq!(empty_page.outcome, ParseOutcome::Empty);
    assert_eq!(unknown_page.outcome, ParseOutcome::Unrecognized);
    assert_eq!(unknown_page.total_count, None);
}

#[test]
fn offsite_and_script_links_never_become_attachments() {
    let html = r#"<table class="soubory"><tr>
        <td></td><td>Externí</td><td></td><td></td><td></td>
        <td><a href="https://elsewhere.example.org/x.pdf?download=1">x</a></td>
        <td><a href="javascript:download(1)"><img sysid="mime-pdf"></a></td>
    </tr></table>"#;
    let page = parser().parse(html);

    assert!(page.entries.is_empty());
}

#[test]
fn parsing_is_deterministic() {
    let html = format!(
        r#"<table class="soubory">{}{}</table><p>1-2 z 2</p>"#,
        scenario_row(),
        scenario_row()
    );
    let parser = parser();
    let first = parser.parse(&html);
    let second = parser.parse(&html);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn malformed_markup_degrades_without_panicking() {
    let inputs = [
        "",
        "<table><tr><td>",
        "<<<>>><a href=>",
        "<table class='soubory'><tr><td>1</td></tr></table>",
    ];
    for html in inputs {
        let page = parser().parse(html);
        assert!(page.entries.is_empty(), "input {html:?}");
    }
}
