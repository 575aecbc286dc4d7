use portal_core::{DocumentEntry, Locale, ParseOutcome};
use serde::{Deserialize, Serialize};

/// Cached result of discovering one folder (all pages and subfolders merged).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderListing {
    pub entries: Vec<DocumentEntry>,
    #[serde(default)]
    pub total_count: Option<u32>,
    /// `None` for records migrated from older layouts.
    #[serde(default)]
    pub outcome: Option<ParseOutcome>,
}

impl FolderListing {
    pub fn empty(outcome: ParseOutcome) -> Self {
        Self {
            entries: Vec::new(),
            total_count: None,
            outcome: Some(outcome),
        }
    }
}

/// Every listing layout that may still be found in a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListingPayload {
    Current(FolderListing),
    PlainArray(Vec<DocumentEntry>),
    DualLanguage {
        cs: Vec<DocumentEntry>,
        en: Vec<DocumentEntry>,
    },
}

impl ListingPayload {
    /// Bring any stored layout to the current one, choosing the language
    /// half of a dual-language record by `locale`.
    pub fn migrate(self, locale: Locale) -> FolderListing {
        let entries = match self {
            ListingPayload::Current(listing) => return listing,
            ListingPayload::PlainArray(entries) => entries,
            ListingPayload::DualLanguage { cs, en } => {
                let (preferred, other) = match locale {
                    Locale::En => (en, cs),
                    Locale::Cs | Locale::Sk => (cs, en),
                };
                if preferred.is_empty() {
                    other
                } else {
                    preferred
                }
            }
        };
        FolderListing {
            total_count: None,
            outcome: None,
            entries,
        }
    }
}

impl From<FolderListing> for ListingPayload {
    fn from(listing: FolderListing) -> Self {
        ListingPayload::Current(listing)
    }
}
