use std::sync::Arc;

use crosspoint_core::models::GamePage;
use crosspoint_core::QueryDescriptor;

use crate::api::ApiClient;
use crate::cache::{shared, CacheEntry, QueryOptions, RequestCache, MINUTE_MS};

/// Category of search result entries in the request cache.
pub const SEARCH_CATEGORY: &str = "gameSearch";

/// Incrementally growing search results for one query.
///
/// Each page size is its own cache entry, so going back to a smaller page
/// is served from cache.
#[derive(Debug)]
pub struct SearchPager {
    api: Arc<ApiClient>,
    cache: RequestCache<GamePage>,
    query: String,
    step: usize,
    page_size: usize,
}

impl SearchPager {
    #[must_use]
    pub fn new(api: Arc<ApiClient>, cache: RequestCache<GamePage>, page_size: usize) -> Self {
        Self {
            api,
            cache,
            query: String::new(),
            step: page_size,
            page_size,
        }
    }

    /// Cache policy for search pages.
    #[must_use]
    pub fn options() -> QueryOptions {
        QueryOptions::new(10 * MINUTE_MS, 30 * MINUTE_MS)
    }

    /// Replaces the query text and resets to the first page.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.page_size = self.step;
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Descriptor for the current page, or `None` for a blank query.
    #[must_use]
    pub fn descriptor(&self) -> Option<QueryDescriptor> {
        let query = self.query.trim();
        if query.is_empty() {
            return None;
        }
        Some(
            QueryDescriptor::new(SEARCH_CATEGORY)
                .with_param("q", query)
                .with_param("limit", self.page_size),
        )
    }

    /// Current page, starting a fetch if needed. Blank queries never fetch.
    #[must_use]
    pub fn current(&self) -> Option<CacheEntry<GamePage>> {
        let descriptor = self.descriptor()?;
        Some(self.cache.get(&descriptor, self.fetcher(), Self::options()))
    }

    /// Waits for the current page to settle.
    pub async fn load(&self) -> Option<CacheEntry<GamePage>> {
        let descriptor = self.descriptor()?;
        Some(self.cache.fetch(&descriptor, self.fetcher(), Self::options()).await)
    }

    /// Whether the last settled page says more results exist.
    #[must_use]
    pub fn can_load_more(&self) -> bool {
        self.descriptor()
            .and_then(|d| self.cache.peek(&d))
            .and_then(|entry| entry.value)
            .is_some_and(|page| page.can_load_more(self.page_size))
    }

    /// Grows the page by one step and loads it. Returns `None` when there
    /// is nothing more to load.
    pub async fn load_more(&mut self) -> Option<CacheEntry<GamePage>> {
        if !self.can_load_more() {
            return None;
        }
        self.page_size += self.step;
        self.load().await
    }

    fn fetcher(&self) -> crate::cache::SharedFetcher<GamePage> {
        let api = Arc::clone(&self.api);
        let query = self.query.trim().to_string();
        let limit = self.page_size;
        shared(move || {
            let api = Arc::clone(&api);
            let query = query.clone();
            async move { api.search_games(&query, limit).await }
        })
    }
}
