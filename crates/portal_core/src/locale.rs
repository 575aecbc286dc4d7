//! Multi-locale keyword tables.
//!
//! All keywords are stored folded (ASCII, lowercase) and compared against
//! [`fold`]ed page text, so `Přílohy`, `Prílohy` and `prilohy:` all match.

/// Column or metadata field a label can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Subfolder,
    Name,
    Author,
    Date,
    Comment,
}

impl Field {
    pub(crate) const ALL: [Field; 5] = [
        Field::Subfolder,
        Field::Name,
        Field::Author,
        Field::Date,
        Field::Comment,
    ];

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Field::Subfolder => &[
                "slozka", "podslozka", "adresar", "priecinok", "podpriecinok", "folder",
                "subfolder",
            ],
            Field::Name => &[
                "nazev", "nazov", "jmeno", "soubor", "subor", "dokument", "name", "file",
                "document", "title",
            ],
            Field::Author => &[
                "autor", "vlozil", "vlozila", "vlozil(a)", "author", "inserted by", "uploaded by",
                "owner",
            ],
            Field::Date => &[
                "datum", "datum vlozeni", "vlozeno", "zmeneno", "naposledy zmeneno", "zmenene",
                "posledna zmena", "date", "last modified", "modified", "inserted",
                "uploaded",
            ],
            Field::Comment => &[
                "komentar", "popis", "poznamka", "comment", "description", "note",
            ],
        }
    }

    /// True when a folded label names this field.
    pub(crate) fn matches(self, folded: &str) -> bool {
        keyword_match(folded, self.keywords())
    }

    /// First field named by a folded label, in [`Field::ALL`] order.
    pub(crate) fn classify(folded: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|field| field.matches(folded))
    }
}

const ATTACHMENT_LABELS: &[&str] = &[
    "prilohy",
    "priloha",
    "pripojene soubory",
    "pripojene subory",
    "attachments",
    "attachment",
    "attached files",
];

const EMPTY_FOLDER_PHRASES: &[&str] = &[
    "slozka je prazdna",
    "priecinok je prazdny",
    "folder is empty",
    "this folder is empty",
    "zadne soubory",
    "ziadne subory",
    "no files",
];

/// Anchor labels that never name a document.
const NON_DOCUMENT_LABELS: &[&str] = &[
    "..",
    "nadrazena slozka",
    "o uroven vys",
    "o uroven vyse",
    "moje slozky",
    "hledat",
    "vyhledat",
    "vyhledavani",
    "nastaveni",
    "informace",
    "info",
    "nahled",
    "profil",
    "nadradeny priecinok",
    "o uroven vyssie",
    "moje priecinky",
    "hladat",
    "vyhladavanie",
    "nastavenia",
    "informacie",
    "nahlad",
    "parent folder",
    "up one level",
    "my folders",
    "search",
    "settings",
    "information",
    "details",
    "preview",
    "profile",
];

/// Fold text for keyword comparison: transliterate to ASCII, lowercase,
/// collapse whitespace and drop a trailing colon.
pub fn fold(text: &str) -> String {
    let ascii = deunicode::deunicode(text).to_lowercase();
    let collapsed = ascii.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches(':').trim_end().to_string()
}

pub(crate) fn is_attachments_label(folded: &str) -> bool {
    keyword_match(folded, ATTACHMENT_LABELS)
}

pub(crate) fn is_non_document_label(folded: &str) -> bool {
    NON_DOCUMENT_LABELS.contains(&folded)
}

pub(crate) fn mentions_empty_folder(folded: &str) -> bool {
    EMPTY_FOLDER_PHRASES.iter().any(|phrase| folded.contains(phrase))
}

/// Exact match, or the label starts with the keyword followed by a word break.
fn keyword_match(folded: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| {
        folded == *kw
            || folded
                .strip_prefix(kw)
                .is_some_and(|rest| rest.starts_with([' ', '(', '/', '-']))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folding_strips_diacritics_and_colon() {
        assert_eq!(fold("  Přílohy: "), "prilohy");
        assert_eq!(fold("Naposledy\n změněno"), "naposledy zmeneno");
    }

    #[test]
    fn header_labels_classify_across_locales() {
        assert_eq!(Field::classify(&fold("Název")), Some(Field::Name));
        assert_eq!(Field::classify(&fold("Názov")), Some(Field::Name));
        assert_eq!(Field::classify(&fold("Last modified")), Some(Field::Date));
        assert_eq!(Field::classify(&fold("Vložil(a)")), Some(Field::Author));
        assert_eq!(Field::classify(&fold("Složka")), Some(Field::Subfolder));
        assert_eq!(Field::classify(&fold("Komentář")), Some(Field::Comment));
        assert_eq!(Field::classify(&fold("Velikost")), None);
    }

    #[test]
    fn attachment_labels_match_every_locale() {
        assert!(is_attachments_label(&fold("Přílohy")));
        assert!(is_attachments_label(&fold("Prílohy")));
        assert!(is_attachments_label(&fold("Attachments:")));
        assert!(!is_attachments_label(&fold("Autor")));
    }
}
