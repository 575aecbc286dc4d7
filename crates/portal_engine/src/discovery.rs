use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use portal_core::{validate_url, DocumentEntry, FolderLink, ParsedPage, TableParser};
use portal_logging::{portal_debug, portal_info, portal_trace, portal_warn};
use url::Url;

use crate::cache::{CacheKey, CacheManager, CacheStore, FolderListing, ListingPayload, Namespace};
use crate::config::EngineConfig;
use crate::decode::decode_markup;
use crate::resolver::{LinkResolver, Resolution};
use crate::transport::{LimitedTransport, Transport};
use crate::TransportError;

/// A folder to list: the cache identity and where its listing lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    pub id: String,
    pub reference: String,
}

impl FolderRef {
    pub fn new(id: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reference: reference.into(),
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(Namespace::Files, self.id.clone())
    }
}

/// Entry point for hosts: folder listings through the cache, document
/// opening through the resolver. Cheap to clone.
#[derive(Clone)]
pub struct DocumentEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    parser: TableParser,
    resolver: LinkResolver,
    cache: CacheManager,
}

impl DocumentEngine {
    /// Every retrieval made by the engine, resolver included, shares one
    /// limiter of `config.max_concurrent_requests` permits.
    pub fn new(config: EngineConfig, transport: Arc<dyn Transport>, store: Arc<dyn CacheStore>) -> Self {
        let limited: Arc<dyn Transport> = Arc::new(LimitedTransport::new(
            transport,
            config.max_concurrent_requests,
        ));
        let parser = TableParser::new(config.base_url.clone());
        let resolver = LinkResolver::new(config.base_url.clone(), limited.clone());
        let cache = CacheManager::new(&config, store);
        Self {
            inner: Arc::new(EngineInner {
                config,
                transport: limited,
                parser,
                resolver,
                cache,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &CacheManager {
        &self.inner.cache
    }

    pub fn resolver(&self) -> &LinkResolver {
        &self.inner.resolver
    }

    /// Cached listing when present (stale ones are refreshed in the
    /// background), otherwise a fresh discovery.
    pub async fn list_folder(&self, folder: &FolderRef) -> FolderListing {
        let key = folder.cache_key();
        let engine = self.clone();
        let target = folder.clone();
        let cached = self
            .inner
            .cache
            .get_or_revalidate::<ListingPayload, _, _>(&key, move || async move {
                engine.discover(&target).await.map(ListingPayload::from)
            })
            .await;
        match cached {
            Some(payload) => payload.migrate(self.inner.config.preferred_locale),
            None => self.refresh_folder(folder).await,
        }
    }

    /// Discover `folder` now and overwrite its cache record. A failed primary
    /// retrieval yields an empty listing that is not cached.
    pub async fn refresh_folder(&self, folder: &FolderRef) -> FolderListing {
        match self.discover(folder).await {
            Some(listing) => {
                self.inner.cache.set(&folder.cache_key(), &listing).await;
                listing
            }
            None => FolderListing {
                entries: Vec::new(),
                total_count: None,
                outcome: None,
            },
        }
    }

    pub async fn open_document(&self, reference: &str) -> Resolution {
        self.inner.resolver.resolve(reference).await
    }

    async fn discover(&self, folder: &FolderRef) -> Option<FolderListing> {
        let Some(url) = validate_url(&folder.reference, &self.inner.config.base_url) else {
            portal_warn!("folder {} has an invalid reference {}", folder.id, folder.reference);
            return None;
        };
        let visited = Arc::new(Mutex::new(HashSet::from([url.to_string()])));
        match self.discover_folder(url, 0, visited).await {
            Ok(listing) => {
                portal_info!(
                    "folder {} discovered: {} entries",
                    folder.id,
                    listing.entries.len()
                );
                Some(listing)
            }
            Err(err) => {
                portal_warn!("folder {} could not be retrieved: {err}", folder.id);
                None
            }
        }
    }

    /// Primary listing first, then its pagination pages concurrently, then
    /// every subfolder found on any of those pages. Each folder URL is
    /// discovered at most once per call.
    fn discover_folder(
        &self,
        url: Url,
        depth: usize,
        visited: Visited,
    ) -> BoxFuture<'_, Result<FolderListing, TransportError>> {
        async move {
            let primary = self.fetch_page(&url).await?;

            let pages = primary
                .pagination
                .iter()
                .filter_map(|reference| Url::parse(reference).ok())
                .map(|page| async move {
                    match self.fetch_page(&page).await {
                        Ok(parsed) => Some(parsed),
                        Err(err) => {
                            portal_warn!("pagination page {page} skipped: {err}");
                            None
                        }
                    }
                });
            let pages: Vec<ParsedPage> = join_all(pages).await.into_iter().flatten().collect();

            let mut links: Vec<FolderLink> = Vec::new();
            for link in primary.subfolders.iter().chain(pages.iter().flat_map(|p| &p.subfolders)) {
                if !links.iter().any(|known| known.reference == link.reference) {
                    links.push(link.clone());
                }
            }

            let descend = depth < self.inner.config.max_folder_depth;
            if !descend && !links.is_empty() {
                portal_debug!("depth limit reached at {url}; {} subfolders skipped", links.len());
            }
            let subfolders = links
                .into_iter()
                .filter(|_| descend)
                .filter_map(|link| Some((link.name, Url::parse(&link.reference).ok()?)))
                .filter(|(_, sub)| claim(&visited, sub))
                .map(|(name, sub)| {
                    let visited = visited.clone();
                    async move {
                        match self.discover_folder(sub.clone(), depth + 1, visited).await {
                            Ok(listing) => inherit_subfolder(listing.entries, &name),
                            Err(err) => {
                                portal_warn!("subfolder {sub} skipped: {err}");
                                Vec::new()
                            }
                        }
                    }
                });
            let folder_entries = join_all(subfolders).await;

            let mut entries = Vec::new();
            let batches = std::iter::once(primary.entries)
                .chain(pages.into_iter().map(|page| page.entries))
                .chain(folder_entries);
            for batch in batches {
                for entry in batch {
                    push_unique(&mut entries, entry);
                }
            }

            Ok(FolderListing {
                entries,
                total_count: primary.total_count,
                outcome: Some(primary.outcome),
            })
        }
        .boxed()
    }

    async fn fetch_page(&self, url: &Url) -> Result<ParsedPage, TransportError> {
        let response = self.inner.transport.retrieve(url.as_str()).await?;
        let page_url = Url::parse(&response.final_uri).unwrap_or_else(|_| url.clone());
        let decoded = decode_markup(&response.body, response.content_type(), Some(&page_url));
        if decoded.lossy {
            portal_debug!("{page_url} decoded lossily as {}", decoded.encoding_label);
        }
        Ok(self.inner.parser.parse_page(&decoded.text, &page_url))
    }
}

/// Folder URLs already taken by one discovery.
type Visited = Arc<Mutex<HashSet<String>>>;

/// True the first time `url` is seen.
fn claim(visited: &Visited, url: &Url) -> bool {
    let fresh = visited
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(url.to_string());
    if !fresh {
        portal_trace!("folder {url} already visited");
    }
    fresh
}

fn inherit_subfolder(mut entries: Vec<DocumentEntry>, name: &str) -> Vec<DocumentEntry> {
    for entry in &mut entries {
        if entry.subfolder.is_empty() {
            entry.subfolder = name.to_string();
        }
    }
    entries
}

/// Keep the first entry for any attachment reference already listed.
fn push_unique(entries: &mut Vec<DocumentEntry>, entry: DocumentEntry) {
    let seen = entries.iter().any(|existing| {
        existing.attachments.iter().any(|a| {
            entry
                .attachments
                .iter()
                .any(|b| a.reference == b.reference)
        })
    });
    if !seen {
        entries.push(entry);
    }
}
