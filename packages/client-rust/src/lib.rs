//! `CrossPoint` client: request cache, aggregation and optimistic mutations
//! over the catalog, playlist and review API.

pub mod aggregate;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod optimistic;
pub mod transport;
pub mod worker;

pub use aggregate::{AggregateViewModel, Aggregator, ExploreData, ExploreFeed, SearchPager};
pub use api::{ApiClient, ExploreCategory};
pub use auth::{AuthSession, ListenerGuard, StaticIdentity};
pub use cache::{CacheEntry, QueryOptions, QueryStatus, RequestCache, Subscription};
pub use config::ClientConfig;
pub use error::{ApiError, ErrorInfo, ErrorKind};
pub use optimistic::{
    LikeToggle, MyPlaylists, MyReviews, PlaylistDetail, PlaylistForm, PlaylistPicker,
    ReviewEditor, ToggleOutcome, ToggleState,
};

use std::sync::Arc;

use crosspoint_core::models::{Game, GamePage, Playlist};
use crosspoint_core::{ClockSource, GameId, IdentityProvider, PlaylistId, SystemClock, User};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::cache::{CacheGcWorker, GcTask};
use crate::optimistic::USER_CATEGORY;
use crate::transport::{build_transport_pipeline, Transport};
use crate::worker::BackgroundWorker;

/// Entry point wiring session, API client, caches and GC together.
///
/// Must be created inside a Tokio runtime: construction starts the cache
/// GC worker.
pub struct CrossPoint {
    config: ClientConfig,
    session: Arc<AuthSession>,
    api: Arc<ApiClient>,
    games: RequestCache<Vec<Game>>,
    search: RequestCache<GamePage>,
    playlists: RequestCache<Vec<Playlist>>,
    gc: Mutex<Option<BackgroundWorker<CacheGcWorker>>>,
    _user_listener: ListenerGuard,
}

impl CrossPoint {
    /// Client over HTTP with the system clock.
    #[must_use]
    pub fn new(config: ClientConfig, identity: Arc<dyn IdentityProvider>) -> Self {
        let transport = build_transport_pipeline(&config);
        Self::with_parts(config, identity, transport, Arc::new(SystemClock))
    }

    /// Client over an arbitrary transport and clock.
    #[must_use]
    pub fn with_parts(
        config: ClientConfig,
        identity: Arc<dyn IdentityProvider>,
        transport: Transport,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        let session = Arc::new(AuthSession::new(identity));
        let api = Arc::new(ApiClient::with_transport(transport, Arc::clone(&session)));
        let defaults = config.default_query;
        let games = RequestCache::with_defaults(Arc::clone(&clock), defaults);
        let search = RequestCache::with_defaults(Arc::clone(&clock), defaults);
        let playlists = RequestCache::with_defaults(clock, defaults);

        let gc = CacheGcWorker::new()
            .watch(games.clone())
            .watch(search.clone())
            .watch(playlists.clone())
            .start(config.gc_interval_ms);

        let user_listener = session.on_change(user_change_listener(&api, playlists.clone()));

        Self {
            config,
            session,
            api,
            games,
            search,
            playlists,
            gc: Mutex::new(Some(gc)),
            _user_listener: user_listener,
        }
    }

    /// Restores the identity provider's session.
    ///
    /// # Errors
    ///
    /// `ApiError::Identity` if the provider fails; the client stays usable signed out.
    pub async fn start(&self) -> Result<Option<User>, ApiError> {
        let user = self.session.resolve().await?;
        info!(signed_in = user.is_some(), api = %self.config.base_url, "crosspoint client ready");
        Ok(user)
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    #[must_use]
    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    #[must_use]
    pub fn explore_feed(&self) -> ExploreFeed {
        ExploreFeed::new(&self.api, self.games.clone(), self.config.explore_limit)
    }

    #[must_use]
    pub fn search(&self, query: &str) -> SearchPager {
        let mut pager = SearchPager::new(
            Arc::clone(&self.api),
            self.search.clone(),
            self.config.search_page_size,
        );
        pager.set_query(query);
        pager
    }

    /// Like button for `game`, initialised from the server when signed in.
    pub async fn like_toggle(&self, game: GameId) -> LikeToggle {
        LikeToggle::mount(Arc::clone(&self.api), game).await
    }

    #[must_use]
    pub fn my_playlists(&self) -> MyPlaylists {
        MyPlaylists::new(Arc::clone(&self.api), self.playlists.clone())
    }

    #[must_use]
    pub fn playlist(&self, id: PlaylistId) -> PlaylistDetail {
        PlaylistDetail::new(Arc::clone(&self.api), id).with_cache(self.playlists.clone())
    }

    #[must_use]
    pub fn playlist_picker(&self, game: GameId) -> PlaylistPicker {
        PlaylistPicker::new(Arc::clone(&self.api), game).with_cache(self.playlists.clone())
    }

    #[must_use]
    pub fn new_playlist_form(&self) -> PlaylistForm {
        PlaylistForm::create(Arc::clone(&self.api)).with_cache(self.playlists.clone())
    }

    #[must_use]
    pub fn edit_playlist_form(&self, id: PlaylistId) -> PlaylistForm {
        PlaylistForm::edit(Arc::clone(&self.api), id).with_cache(self.playlists.clone())
    }

    #[must_use]
    pub fn review_editor(&self, game: GameId) -> ReviewEditor {
        ReviewEditor::new(Arc::clone(&self.api), game)
    }

    #[must_use]
    pub fn my_reviews(&self) -> MyReviews {
        MyReviews::new(Arc::clone(&self.api))
    }

    /// Runs a GC sweep over every cache now.
    ///
    /// # Errors
    ///
    /// Fails once [`shutdown`](Self::shutdown) has run.
    pub async fn sweep_caches(&self) -> anyhow::Result<usize> {
        let (tx, rx) = oneshot::channel();
        {
            let gc = self.gc.lock();
            let Some(worker) = gc.as_ref() else {
                anyhow::bail!("cache gc worker stopped");
            };
            worker.try_submit(GcTask::SweepAndReport(tx))?;
        }
        Ok(rx.await?)
    }

    /// Stops the GC worker.
    pub async fn shutdown(&self) {
        let worker = self.gc.lock().take();
        if let Some(mut worker) = worker {
            worker.stop().await;
        }
    }
}

impl std::fmt::Debug for CrossPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossPoint")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// On every user change: per-user cache entries are dropped, and a signed-in
/// user's server profile is initialised in the background.
fn user_change_listener(
    api: &Arc<ApiClient>,
    user_cache: RequestCache<Vec<Playlist>>,
) -> impl Fn(Option<&User>) + Send + Sync + 'static {
    let api = Arc::downgrade(api);
    move |user: Option<&User>| {
        user_cache.remove_matching(|d| d.in_category(USER_CATEGORY));
        if user.is_none() {
            return;
        }
        let (Some(api), Ok(runtime)) = (api.upgrade(), tokio::runtime::Handle::try_current()) else {
            return;
        };
        runtime.spawn(async move {
            if let Err(err) = api.init_user().await {
                warn!(error = %err, "user init failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use crosspoint_core::{ManualClock, UserId};

    use super::*;
    use crate::api::testing::ScriptedTransport;

    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }

    fn user() -> User {
        User {
            uid: UserId("user-1".to_string()),
            email: None,
            display_name: None,
        }
    }

    #[tokio::test]
    async fn sign_in_initialises_user_and_sign_out_drops_user_data() {
        let transport = ScriptedTransport::new();
        transport
            .route(
                "/playlists/me",
                200,
                r#"{"playlists": [{"id": 1, "name": "Private stash"}]}"#,
            )
            .route("/users/me/init", 200, "{}");
        let client = CrossPoint::with_parts(
            ClientConfig::default(),
            Arc::new(StaticIdentity::signed_out(user(), "tok")),
            Transport::new(transport.clone()),
            Arc::new(ManualClock::new(0)),
        );
        client.start().await.unwrap();
        assert!(!client.session().is_signed_in());

        let mine = client.my_playlists();
        client.session().sign_in("a@example.com", "pw").await.unwrap();
        let loaded = mine.load().await;
        assert_eq!(loaded.value.map(|p| p.len()), Some(1));

        client.session().sign_out().await.unwrap();
        assert!(client.playlists.peek(&MyPlaylists::descriptor()).is_none());
        let after = mine.load().await;
        assert_eq!(after.status, QueryStatus::Error);
        assert_eq!(after.value, None);
        assert_eq!(after.error_message(), Some("User must be authenticated"));

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(transport
            .requests()
            .contains(&("POST".to_string(), "/users/me/init".to_string())));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn sweep_reports_evictions_until_shutdown() {
        let clock = Arc::new(ManualClock::new(0));
        let client = CrossPoint::with_parts(
            ClientConfig::default(),
            Arc::new(StaticIdentity::anonymous()),
            Transport::new(ScriptedTransport::new()),
            clock.clone(),
        );
        client
            .playlists
            .set_value(&MyPlaylists::descriptor(), Vec::new());
        clock.advance(QueryOptions::default().gc_ms);

        assert_eq!(client.sweep_caches().await.unwrap(), 1);
        client.shutdown().await;
        assert!(client.sweep_caches().await.is_err());
    }
}
