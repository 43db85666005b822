use std::sync::Arc;

use crosspoint_core::models::Game;
use crosspoint_core::QueryDescriptor;

use super::{AggregateViewModel, Aggregator};
use crate::api::{ApiClient, ExploreCategory};
use crate::cache::{shared, QueryOptions, RequestCache, SharedFetcher, MINUTE_MS};

/// The five curated explore listings, loaded and cached together.
#[derive(Debug)]
pub struct ExploreFeed {
    aggregator: Aggregator<Game>,
    limit: usize,
}

/// Explore page content with one field per category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExploreData {
    pub upcoming: Vec<Game>,
    pub trending: Vec<Game>,
    pub recent: Vec<Game>,
    pub most_anticipated: Vec<Game>,
    pub hidden_gems: Vec<Game>,
    pub loading: bool,
    pub error: Option<String>,
}

impl From<AggregateViewModel<Game>> for ExploreData {
    fn from(mut view: AggregateViewModel<Game>) -> Self {
        let mut take = |c: ExploreCategory| view.categories.remove(c.name()).unwrap_or_default();
        Self {
            upcoming: take(ExploreCategory::Upcoming),
            trending: take(ExploreCategory::Trending),
            recent: take(ExploreCategory::Recent),
            most_anticipated: take(ExploreCategory::MostAnticipated),
            hidden_gems: take(ExploreCategory::HiddenGems),
            loading: view.loading,
            error: view.error,
        }
    }
}

impl ExploreData {
    /// Rows of one category.
    #[must_use]
    pub fn games(&self, category: ExploreCategory) -> &[Game] {
        match category {
            ExploreCategory::Upcoming => &self.upcoming,
            ExploreCategory::Trending => &self.trending,
            ExploreCategory::Recent => &self.recent,
            ExploreCategory::MostAnticipated => &self.most_anticipated,
            ExploreCategory::HiddenGems => &self.hidden_gems,
        }
    }
}

impl ExploreFeed {
    #[must_use]
    pub fn new(api: &Arc<ApiClient>, cache: RequestCache<Vec<Game>>, limit: usize) -> Self {
        let aggregator = ExploreCategory::ALL
            .into_iter()
            .fold(Aggregator::new(cache), |agg, category| {
                agg.category(
                    category.name(),
                    Self::descriptor(category, limit),
                    fetcher(api, category, limit),
                    Self::options(category),
                )
            });
        Self { aggregator, limit }
    }

    /// Cache descriptor of one category: `explore/<name>` with `limit`.
    #[must_use]
    pub fn descriptor(category: ExploreCategory, limit: usize) -> QueryDescriptor {
        QueryDescriptor::new(format!("explore/{}", category.name())).with_param("limit", limit)
    }

    /// Time-sensitive listings refresh faster than curated ones.
    #[must_use]
    pub fn options(category: ExploreCategory) -> QueryOptions {
        match category {
            ExploreCategory::Upcoming | ExploreCategory::Trending | ExploreCategory::Recent => {
                QueryOptions::new(5 * MINUTE_MS, 30 * MINUTE_MS)
            }
            ExploreCategory::MostAnticipated | ExploreCategory::HiddenGems => {
                QueryOptions::new(10 * MINUTE_MS, 60 * MINUTE_MS)
            }
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Current view, starting fetches for missing or stale categories.
    #[must_use]
    pub fn view_model(&self) -> AggregateViewModel<Game> {
        self.aggregator.aggregate()
    }

    #[must_use]
    pub fn data(&self) -> ExploreData {
        self.view_model().into()
    }

    /// Waits until every category has settled.
    pub async fn load(&self) -> ExploreData {
        self.aggregator.settled().await.into()
    }

    pub fn refetch_all(&self) {
        self.aggregator.refetch_all();
    }
}

fn fetcher(api: &Arc<ApiClient>, category: ExploreCategory, limit: usize) -> SharedFetcher<Vec<Game>> {
    let api = Arc::clone(api);
    shared(move || {
        let api = Arc::clone(&api);
        async move { api.explore(category, limit).await.map(|page| page.results) }
    })
}

#[cfg(test)]
mod tests {
    use crosspoint_core::{GameId, ManualClock};

    use super::*;
    use crate::api::testing::{signed_out_client, ScriptedTransport};
    use crate::cache::QueryStatus;

    #[tokio::test]
    async fn one_failing_category_does_not_blank_the_page() {
        let transport = ScriptedTransport::new();
        transport
            .route("/games/explore/upcoming", 200, r#"[{"id": 1}, {"id": 2}]"#)
            .route("/games/explore/trending", 200, r#"[{"id": 3}]"#)
            .route("/games/explore/recent", 200, r#"{"results": [{"id": 4}]}"#)
            .route("/games/explore/most-anticipated", 200, "[]");
        let api = signed_out_client(&transport).await;
        let cache = RequestCache::new(Arc::new(ManualClock::new(0)));
        let feed = ExploreFeed::new(&api, cache, 20);

        let data = feed.load().await;

        assert!(!data.loading);
        assert_eq!(data.error.as_deref(), Some("connection refused"));
        assert_eq!(data.upcoming.iter().map(|g| g.id).collect::<Vec<_>>(), vec![GameId(1), GameId(2)]);
        assert_eq!(data.trending.len(), 1);
        assert_eq!(data.recent.len(), 1);
        assert!(data.most_anticipated.is_empty());
        assert!(data.hidden_gems.is_empty());

        let view = feed.view_model();
        assert_eq!(view.status("mostAnticipated"), QueryStatus::Success);
        assert_eq!(view.failed(), vec!["hiddenGems"]);
        assert_eq!(transport.requests().len(), 5);
    }

    #[test]
    fn descriptors_carry_limit() {
        let a = ExploreFeed::descriptor(ExploreCategory::Trending, 20);
        let b = ExploreFeed::descriptor(ExploreCategory::Trending, 50);
        assert_ne!(a.key(), b.key());
        assert_eq!(a.category(), "explore/trending");
        assert_eq!(
            ExploreFeed::options(ExploreCategory::HiddenGems).stale_ms,
            10 * MINUTE_MS
        );
    }
}
