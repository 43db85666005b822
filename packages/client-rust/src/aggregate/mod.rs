//! Fan-out of several category queries folded into one view model.
//!
//! An [`Aggregator`] owns a fixed list of named categories. Each category is
//! an ordinary request-cache query, so categories are deduplicated, cached
//! and refreshed independently. The aggregator only folds their snapshots.

mod explore;
mod search;

pub use explore::{ExploreData, ExploreFeed};
pub use search::SearchPager;

use std::collections::BTreeMap;

use crosspoint_core::QueryDescriptor;
use serde::Serialize;

use crate::cache::{CacheEntry, QueryOptions, QueryStatus, RequestCache, SharedFetcher, Subscription};

/// Folded state of every category of an [`Aggregator`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateViewModel<T> {
    /// Items per category. Categories without a value yet are empty.
    pub categories: BTreeMap<String, Vec<T>>,
    pub statuses: BTreeMap<String, QueryStatus>,
    /// True while any category has no value and no error yet.
    pub loading: bool,
    /// Messages of every failed category joined with `", "`.
    pub error: Option<String>,
}

impl<T> Default for AggregateViewModel<T> {
    fn default() -> Self {
        Self {
            categories: BTreeMap::new(),
            statuses: BTreeMap::new(),
            loading: false,
            error: None,
        }
    }
}

impl<T: Clone> AggregateViewModel<T> {
    fn fold<'a>(entries: impl IntoIterator<Item = (&'a str, Option<CacheEntry<Vec<T>>>)>) -> Self {
        let mut view = Self::default();
        let mut errors = Vec::new();
        for (name, entry) in entries {
            let (status, value) = match entry {
                Some(entry) => {
                    if entry.status == QueryStatus::Error {
                        if let Some(message) = entry.error_message() {
                            errors.push(message.to_string());
                        }
                    }
                    (entry.status, entry.value)
                }
                None => (QueryStatus::Idle, None),
            };
            // A category that has not started yet counts as loading.
            view.loading |= status == QueryStatus::Loading
                || (status == QueryStatus::Idle && value.is_none());
            let value = value.unwrap_or_default();
            view.statuses.insert(name.to_string(), status);
            view.categories.insert(name.to_string(), value);
        }
        if !errors.is_empty() {
            view.error = Some(errors.join(", "));
        }
        view
    }
}

impl<T> AggregateViewModel<T> {
    /// Items of one category, empty when unknown.
    #[must_use]
    pub fn category(&self, name: &str) -> &[T] {
        self.categories.get(name).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn status(&self, name: &str) -> QueryStatus {
        self.statuses.get(name).copied().unwrap_or(QueryStatus::Idle)
    }

    /// Names of categories whose last fetch failed.
    #[must_use]
    pub fn failed(&self) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, s)| **s == QueryStatus::Error)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

struct Category<T> {
    name: String,
    descriptor: QueryDescriptor,
    fetcher: SharedFetcher<Vec<T>>,
    options: QueryOptions,
    _subscription: Subscription<Vec<T>>,
}

/// Issues one cached query per category and folds the results.
pub struct Aggregator<T> {
    cache: RequestCache<Vec<T>>,
    categories: Vec<Category<T>>,
}

impl<T: Clone + Send + Sync + 'static> Aggregator<T> {
    #[must_use]
    pub fn new(cache: RequestCache<Vec<T>>) -> Self {
        Self {
            cache,
            categories: Vec::new(),
        }
    }

    /// Adds a category. Its entry is pinned against GC while the aggregator lives.
    #[must_use]
    pub fn category(
        mut self,
        name: impl Into<String>,
        descriptor: QueryDescriptor,
        fetcher: SharedFetcher<Vec<T>>,
        options: QueryOptions,
    ) -> Self {
        let subscription = self.cache.subscribe(&descriptor);
        self.categories.push(Category {
            name: name.into(),
            descriptor,
            fetcher,
            options,
            _subscription: subscription,
        });
        self
    }

    /// Category names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Reads every category through the cache, starting fetches for
    /// missing or stale ones, and folds the snapshots.
    #[must_use]
    pub fn aggregate(&self) -> AggregateViewModel<T> {
        AggregateViewModel::fold(self.categories.iter().map(|c| {
            let entry = self
                .cache
                .get(&c.descriptor, c.fetcher.clone(), c.options);
            (c.name.as_str(), Some(entry))
        }))
    }

    /// Folds the current snapshots without starting any fetch.
    #[must_use]
    pub fn view(&self) -> AggregateViewModel<T> {
        AggregateViewModel::fold(
            self.categories
                .iter()
                .map(|c| (c.name.as_str(), self.cache.peek(&c.descriptor))),
        )
    }

    /// [`aggregate`](Self::aggregate) until nothing is loading. Categories
    /// dropped from the cache meanwhile are fetched again.
    pub async fn settled(&self) -> AggregateViewModel<T> {
        let mut changes = self.cache.changes();
        let mut view = self.aggregate();
        while view.loading {
            if changes.changed().await.is_err() {
                break;
            }
            view = self.aggregate();
        }
        view
    }

    /// Refetches every category. Categories never fetched are fetched now.
    pub fn refetch_all(&self) {
        for c in &self.categories {
            if !self.cache.refetch(&c.descriptor) {
                self.cache.get(&c.descriptor, c.fetcher.clone(), c.options);
            }
        }
    }
}

impl<T> std::fmt::Debug for Aggregator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field(
                "categories",
                &self.categories.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
