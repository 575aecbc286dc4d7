use std::fmt;
use std::time::Duration;

/// TTL family: which physical store a record lives in and how long it stays
/// fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheFamily {
    /// Minutes: folder listings, exam terms.
    Short,
    /// Hours to a day: subject and identity metadata.
    Long,
}

impl CacheFamily {
    pub const ALL: [CacheFamily; 2] = [CacheFamily::Short, CacheFamily::Long];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheFamily::Short => "short",
            CacheFamily::Long => "long",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyPolicy {
    pub family: CacheFamily,
    pub ttl: Duration,
    pub encrypted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Files,
    Exams,
    Subject,
    Identity,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Files,
        Namespace::Exams,
        Namespace::Subject,
        Namespace::Identity,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Files => "files_",
            Namespace::Exams => "exams_",
            Namespace::Subject => "subject_",
            Namespace::Identity => "identity_",
        }
    }

    pub fn family(self) -> CacheFamily {
        match self {
            Namespace::Files | Namespace::Exams => CacheFamily::Short,
            Namespace::Subject | Namespace::Identity => CacheFamily::Long,
        }
    }

    /// Personal data is encrypted at rest when a key is configured.
    pub fn is_sensitive(self) -> bool {
        matches!(self, Namespace::Exams | Namespace::Identity)
    }

    pub fn of_key(key: &str) -> Option<Namespace> {
        Namespace::ALL
            .into_iter()
            .find(|ns| key.starts_with(ns.prefix()))
    }
}

/// Namespaced cache key, rendered as `{prefix}{entity}` (e.g. `files_ALG`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    entity: String,
}

impl CacheKey {
    pub fn new(namespace: Namespace, entity: impl Into<String>) -> Self {
        Self {
            namespace,
            entity: entity.into(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let namespace = Namespace::of_key(raw)?;
        let entity = &raw[namespace.prefix().len()..];
        (!entity.is_empty()).then(|| Self::new(namespace, entity))
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn family(&self) -> CacheFamily {
        self.namespace.family()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.namespace.prefix(), self.entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_render_with_namespace_prefix() {
        let key = CacheKey::new(Namespace::Files, "ALG");
        assert_eq!(key.to_string(), "files_ALG");
        assert_eq!(key.family(), CacheFamily::Short);
        assert_eq!(CacheKey::parse("files_ALG"), Some(key));
        assert_eq!(CacheKey::parse("identity_"), None);
        assert_eq!(CacheKey::parse("other_1"), None);
    }
}
