//! Playlist list, playlist detail and playlist form state.

use std::collections::HashSet;
use std::sync::Arc;

use crosspoint_core::models::{NewPlaylist, Playlist};
use crosspoint_core::validation::validate_playlist;
use crosspoint_core::{GameId, PlaylistId, QueryDescriptor};
use parking_lot::Mutex;
use tracing::{info, warn};

use super::OnDrop;
use crate::api::ApiClient;
use crate::cache::{shared, CacheEntry, QueryOptions, RequestCache, SharedFetcher, MINUTE_MS};
use crate::error::ApiError;

/// Category prefix of every per-user cache entry.
pub const USER_CATEGORY: &str = "me";

fn invalidate_user_entries(cache: Option<&RequestCache<Vec<Playlist>>>) {
    if let Some(cache) = cache {
        cache.invalidate_matching(|d| d.in_category(USER_CATEGORY));
    }
}

/// The signed-in user's playlists, served from the request cache.
#[derive(Debug)]
pub struct MyPlaylists {
    api: Arc<ApiClient>,
    cache: RequestCache<Vec<Playlist>>,
    deleting: Mutex<HashSet<PlaylistId>>,
    error: Mutex<Option<String>>,
}

impl MyPlaylists {
    #[must_use]
    pub fn new(api: Arc<ApiClient>, cache: RequestCache<Vec<Playlist>>) -> Self {
        Self {
            api,
            cache,
            deleting: Mutex::new(HashSet::new()),
            error: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn descriptor() -> QueryDescriptor {
        QueryDescriptor::new(format!("{USER_CATEGORY}/playlists"))
    }

    #[must_use]
    pub fn options() -> QueryOptions {
        QueryOptions::new(MINUTE_MS, 10 * MINUTE_MS)
    }

    fn fetcher(&self) -> SharedFetcher<Vec<Playlist>> {
        let api = Arc::clone(&self.api);
        shared(move || {
            let api = Arc::clone(&api);
            async move { api.my_playlists().await }
        })
    }

    /// Current snapshot, fetching if missing or stale.
    #[must_use]
    pub fn current(&self) -> CacheEntry<Vec<Playlist>> {
        self.visible(
            self.cache
                .get(&Self::descriptor(), self.fetcher(), Self::options()),
        )
    }

    pub async fn load(&self) -> CacheEntry<Vec<Playlist>> {
        let entry = self
            .cache
            .fetch(&Self::descriptor(), self.fetcher(), Self::options())
            .await;
        self.visible(entry)
    }

    /// Rows with a delete in flight stay hidden, even when a refetch
    /// returns them.
    fn visible(&self, mut entry: CacheEntry<Vec<Playlist>>) -> CacheEntry<Vec<Playlist>> {
        let deleting = self.deleting.lock();
        if let Some(list) = entry.value.as_mut().filter(|_| !deleting.is_empty()) {
            list.retain(|p| !deleting.contains(&p.id));
        }
        drop(deleting);
        entry
    }

    #[must_use]
    pub fn is_deleting(&self, id: PlaylistId) -> bool {
        self.deleting.lock().contains(&id)
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.error.lock().clone()
    }

    /// Removes the playlist from the list at once and deletes it remotely.
    /// On failure it is put back where it was, unless a refetch already
    /// brought it back.
    ///
    /// # Errors
    ///
    /// Returns the API error after restoring the list.
    pub async fn delete_playlist(&self, id: PlaylistId) -> Result<(), ApiError> {
        if !self.deleting.lock().insert(id) {
            return Ok(());
        }
        let _deleting = OnDrop(|| {
            self.deleting.lock().remove(&id);
        });
        *self.error.lock() = None;
        let mut removed = None;
        self.cache.update(&Self::descriptor(), |list| {
            if let Some(index) = list.iter().position(|p| p.id == id) {
                removed = Some((index, list.remove(index)));
            }
        });

        let result = self.api.delete_playlist(id).await;
        match result {
            Ok(()) => {
                info!(playlist = %id, "playlist deleted");
                self.cache.update(&Self::descriptor(), |list| {
                    list.retain(|p| p.id != id);
                });
                Ok(())
            }
            Err(err) => {
                warn!(playlist = %id, error = %err, "delete failed, restoring playlist");
                if let Some((index, playlist)) = removed {
                    self.cache.update(&Self::descriptor(), |list| {
                        if !list.iter().any(|p| p.id == id) {
                            list.insert(index.min(list.len()), playlist);
                        }
                    });
                }
                *self.error.lock() = Some(err.to_string());
                Err(err)
            }
        }
    }
}

#[derive(Debug, Default)]
struct DetailState {
    playlist: Option<Playlist>,
    removing: HashSet<GameId>,
    deleting: bool,
    deleted: bool,
    error: Option<String>,
}

/// One playlist page: its games, per-game removal and deletion.
#[derive(Debug)]
pub struct PlaylistDetail {
    api: Arc<ApiClient>,
    id: PlaylistId,
    cache: Option<RequestCache<Vec<Playlist>>>,
    state: Mutex<DetailState>,
}

impl PlaylistDetail {
    #[must_use]
    pub fn new(api: Arc<ApiClient>, id: PlaylistId) -> Self {
        Self {
            api,
            id,
            cache: None,
            state: Mutex::new(DetailState::default()),
        }
    }

    /// Keeps the cached "my playlists" list in step with changes made here.
    #[must_use]
    pub fn with_cache(mut self, cache: RequestCache<Vec<Playlist>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// # Errors
    ///
    /// Propagates the API error, which is also kept as [`error`](Self::error).
    pub async fn load(&self) -> Result<Playlist, ApiError> {
        match self.api.playlist(self.id).await {
            Ok(playlist) => {
                let mut state = self.state.lock();
                state.playlist = Some(playlist.clone());
                state.error = None;
                Ok(playlist)
            }
            Err(err) => {
                self.state.lock().error = Some(err.to_string());
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn playlist(&self) -> Option<Playlist> {
        self.state.lock().playlist.clone()
    }

    /// Whether the signed-in user owns the loaded playlist.
    #[must_use]
    pub fn can_edit(&self) -> bool {
        let Some(user) = self.api.session().user() else {
            return false;
        };
        self.state
            .lock()
            .playlist
            .as_ref()
            .is_some_and(|p| p.is_owned_by(&user.uid))
    }

    #[must_use]
    pub fn is_removing(&self, game: GameId) -> bool {
        self.state.lock().removing.contains(&game)
    }

    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.state.lock().deleting
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.state.lock().deleted
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    /// Drops the game from the list at once and removes it remotely. On
    /// failure the game returns to its original position.
    ///
    /// # Errors
    ///
    /// Returns the API error after restoring the game.
    pub async fn remove_game(&self, game: GameId) -> Result<(), ApiError> {
        let removed = {
            let mut state = self.state.lock();
            if state.removing.contains(&game) {
                return Ok(());
            }
            let Some(playlist) = state.playlist.as_mut() else {
                return Ok(());
            };
            let Some(index) = playlist.games.iter().position(|g| g.game_id == game) else {
                return Ok(());
            };
            let item = playlist.games.remove(index);
            state.removing.insert(game);
            state.error = None;
            (index, item)
        };
        let _removing = OnDrop(|| {
            self.state.lock().removing.remove(&game);
        });

        let result = self.api.remove_game_from_playlist(self.id, game).await;
        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                drop(state);
                if let Some(cache) = &self.cache {
                    let id = self.id;
                    cache.update(&MyPlaylists::descriptor(), |list| {
                        if let Some(p) = list.iter_mut().find(|p| p.id == id) {
                            p.games.retain(|g| g.game_id != game);
                        }
                    });
                }
                Ok(())
            }
            Err(err) => {
                warn!(playlist = %self.id, game = %game, error = %err, "remove failed, restoring game");
                let (index, item) = removed;
                if let Some(playlist) = state.playlist.as_mut() {
                    if !playlist.contains(game) {
                        let index = index.min(playlist.games.len());
                        playlist.games.insert(index, item);
                    }
                }
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Deletes the playlist. Success marks it deleted and invalidates
    /// cached per-user lists.
    ///
    /// # Errors
    ///
    /// Returns the API error, also kept as [`error`](Self::error).
    pub async fn delete(&self) -> Result<(), ApiError> {
        {
            let mut state = self.state.lock();
            if state.deleting || state.deleted {
                return Ok(());
            }
            state.deleting = true;
            state.error = None;
        }
        let deleting = OnDrop(|| self.state.lock().deleting = false);
        let result = self.api.delete_playlist(self.id).await;
        drop(deleting);
        {
            let mut state = self.state.lock();
            match &result {
                Ok(()) => state.deleted = true,
                Err(err) => state.error = Some(err.to_string()),
            }
        }
        if result.is_ok() {
            invalidate_user_entries(self.cache.as_ref());
        }
        result
    }
}

/// Create or edit form for a playlist.
#[derive(Debug)]
pub struct PlaylistForm {
    api: Arc<ApiClient>,
    editing: Option<PlaylistId>,
    cache: Option<RequestCache<Vec<Playlist>>>,
    submitting: Mutex<bool>,
    error: Mutex<Option<String>>,
}

impl PlaylistForm {
    /// Form for a new playlist.
    #[must_use]
    pub fn create(api: Arc<ApiClient>) -> Self {
        Self::build(api, None)
    }

    /// Form editing an existing playlist.
    #[must_use]
    pub fn edit(api: Arc<ApiClient>, id: PlaylistId) -> Self {
        Self::build(api, Some(id))
    }

    fn build(api: Arc<ApiClient>, editing: Option<PlaylistId>) -> Self {
        Self {
            api,
            editing,
            cache: None,
            submitting: Mutex::new(false),
            error: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: RequestCache<Vec<Playlist>>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn editing(&self) -> Option<PlaylistId> {
        self.editing
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        *self.submitting.lock()
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.error.lock().clone()
    }

    /// Initial field values: blank and public for a new playlist, the
    /// stored values when editing.
    ///
    /// # Errors
    ///
    /// Propagates the API error when loading the edited playlist fails.
    pub async fn initial(&self) -> Result<NewPlaylist, ApiError> {
        let Some(id) = self.editing else {
            return Ok(NewPlaylist::new("", true));
        };
        let playlist = self.api.playlist(id).await.inspect_err(|err| {
            *self.error.lock() = Some(err.to_string());
        })?;
        let mut draft = NewPlaylist::new(playlist.name.clone().unwrap_or_default(), playlist.is_public());
        draft.description = playlist.description;
        Ok(draft)
    }

    /// Validates and saves. Returns the id of the created or edited playlist.
    ///
    /// # Errors
    ///
    /// `ApiError::Validation` for a blank name (no request is sent),
    /// `ApiError::InProgress` while an earlier submit is still running, or
    /// the API error.
    pub async fn submit(&self, draft: &NewPlaylist) -> Result<PlaylistId, ApiError> {
        let draft = draft.normalized();
        if let Some(message) = validate_playlist(&draft).message() {
            let err = ApiError::validation(message);
            *self.error.lock() = Some(err.to_string());
            return Err(err);
        }
        if std::mem::replace(&mut *self.submitting.lock(), true) {
            return Err(ApiError::InProgress);
        }
        let submitting = OnDrop(|| *self.submitting.lock() = false);
        *self.error.lock() = None;

        let result = match self.editing {
            Some(id) => self.api.update_playlist(id, &draft).await.map(|()| id),
            None => self.api.create_playlist(&draft).await.map(|p| p.id),
        };
        drop(submitting);
        match &result {
            Ok(_) => invalidate_user_entries(self.cache.as_ref()),
            Err(err) => *self.error.lock() = Some(err.to_string()),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crosspoint_core::ManualClock;

    use super::*;
    use crate::api::testing::{signed_in_client, ScriptedTransport};
    use crate::optimistic::PlaylistPicker;

    const DETAIL: &str = r#"{"id": 3, "user_id": "user-1", "name": "RPGs", "games": [
        {"game_id": 1}, {"game_id": 2}, {"game_id": 3}
    ]}"#;

    fn playlist_cache() -> RequestCache<Vec<Playlist>> {
        RequestCache::new(Arc::new(ManualClock::new(0)))
    }

    fn game_ids(playlist: &Playlist) -> Vec<u64> {
        playlist.games.iter().map(|g| g.game_id.0).collect()
    }

    // ---- Playlist detail ----

    #[tokio::test]
    async fn remove_game_restores_position_on_failure() {
        let transport = ScriptedTransport::new();
        transport
            .reply(200, DETAIL)
            .reply(500, r#"{"detail": "internal error"}"#);
        let detail = PlaylistDetail::new(signed_in_client(&transport).await, PlaylistId(3));
        detail.load().await.unwrap();
        assert!(detail.can_edit());

        let err = detail.remove_game(GameId(2)).await.unwrap_err();
        assert_eq!(err.to_string(), "internal error");
        assert_eq!(game_ids(&detail.playlist().unwrap()), vec![1, 2, 3]);
        assert!(!detail.is_removing(GameId(2)));
        assert_eq!(detail.error().as_deref(), Some("internal error"));
    }

    #[tokio::test]
    async fn remove_game_success_drops_it() {
        let transport = ScriptedTransport::new();
        transport.reply(200, DETAIL).reply(204, "");
        let detail = PlaylistDetail::new(signed_in_client(&transport).await, PlaylistId(3));
        detail.load().await.unwrap();

        detail.remove_game(GameId(1)).await.unwrap();
        assert_eq!(game_ids(&detail.playlist().unwrap()), vec![2, 3]);
        assert_eq!(
            transport.requests()[1],
            ("DELETE".to_string(), "/playlists/3/games/1".to_string())
        );
    }

    #[tokio::test]
    async fn delete_marks_deleted_and_invalidates_user_lists() {
        let transport = ScriptedTransport::new();
        transport
            .reply(200, r#"{"playlists": [{"id": 3}]}"#)
            .reply(204, "");
        let api = signed_in_client(&transport).await;
        let cache = playlist_cache();
        let mine = MyPlaylists::new(api.clone(), cache.clone());
        mine.load().await;
        let detail = PlaylistDetail::new(api, PlaylistId(3)).with_cache(cache.clone());

        detail.delete().await.unwrap();
        assert!(detail.is_deleted());
        assert!(!detail.is_deleting());
        assert!(cache.peek(&MyPlaylists::descriptor()).unwrap().is_stale);
    }

    // ---- My playlists ----

    #[tokio::test]
    async fn delete_playlist_restores_on_failure() {
        let transport = ScriptedTransport::new();
        transport
            .reply(200, r#"{"playlists": [{"id": 1}, {"id": 2}, {"id": 3}]}"#)
            .reply(403, r#"{"detail": "not yours"}"#)
            .reply(204, "");
        let mine = MyPlaylists::new(signed_in_client(&transport).await, playlist_cache());
        mine.load().await;

        assert!(mine.delete_playlist(PlaylistId(2)).await.is_err());
        let ids = |m: &MyPlaylists| -> Vec<u64> {
            m.current().value.unwrap().iter().map(|p| p.id.0).collect()
        };
        assert_eq!(ids(&mine), vec![1, 2, 3]);
        assert_eq!(mine.error().as_deref(), Some("not yours"));

        mine.delete_playlist(PlaylistId(2)).await.unwrap();
        assert_eq!(ids(&mine), vec![1, 3]);
        assert!(mine.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refetch_during_delete_keeps_row_hidden_and_single() {
        const LIST: &str = r#"{"playlists": [{"id": 1}, {"id": 2}, {"id": 3}]}"#;
        let transport = ScriptedTransport::delayed(Duration::from_millis(40));
        transport
            .route("/playlists/me", 200, LIST)
            .route("/playlists/me", 200, LIST)
            .route("/playlists/2", 403, r#"{"detail": "not yours"}"#);
        let mine = MyPlaylists::new(signed_in_client(&transport).await, playlist_cache());
        let ids = |m: &MyPlaylists| -> Vec<u64> {
            m.current().value.unwrap().iter().map(|p| p.id.0).collect()
        };
        mine.load().await;

        // Background refetch lands at +40ms, the failed delete at +50ms.
        assert!(mine.cache.invalidate(&MyPlaylists::descriptor()));
        assert!(mine.current().is_fetching);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let (result, during) = tokio::join!(mine.delete_playlist(PlaylistId(2)), async {
            tokio::time::sleep(Duration::from_millis(35)).await;
            ids(&mine)
        });

        assert_eq!(during, vec![1, 3]);
        assert!(result.is_err());
        assert_eq!(ids(&mine), vec![1, 2, 3]);
        assert!(!mine.is_deleting(PlaylistId(2)));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_delete_clears_deleting_flag() {
        let transport = ScriptedTransport::delayed(Duration::from_millis(40));
        transport
            .reply(200, r#"{"playlists": [{"id": 1}, {"id": 2}]}"#)
            .reply(204, "");
        let mine = MyPlaylists::new(signed_in_client(&transport).await, playlist_cache());
        mine.load().await;

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), mine.delete_playlist(PlaylistId(2)))
                .await;
        assert!(abandoned.is_err());
        assert!(!mine.is_deleting(PlaylistId(2)));
    }

    #[tokio::test]
    async fn picker_additions_show_up_without_refetch() {
        let transport = ScriptedTransport::new();
        transport
            .reply(200, r#"{"playlists": []}"#)
            .reply(201, r#"{"playlist": {"id": 9, "name": "Favorites", "is_public": true}}"#)
            .reply(200, "{}");
        let api = signed_in_client(&transport).await;
        let cache = playlist_cache();
        let mine = MyPlaylists::new(api.clone(), cache.clone());
        mine.load().await;
        let picker = PlaylistPicker::new(api, GameId(101)).with_cache(cache);

        picker
            .create_and_add(NewPlaylist::new("Favorites", true))
            .await
            .unwrap();

        let listed = mine.current().value.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].contains(GameId(101)));
        assert_eq!(transport.requests().len(), 3);
    }

    // ---- Form ----

    #[tokio::test]
    async fn form_creates_and_edits() {
        let transport = ScriptedTransport::new();
        transport
            .reply(201, r#"{"playlist": {"id": 4}}"#)
            .reply(200, r#"{"id": 4, "name": "Old", "description": "d", "is_public": false}"#)
            .reply(200, "{}");
        let api = signed_in_client(&transport).await;

        let created = PlaylistForm::create(api.clone())
            .submit(&NewPlaylist::new(" New ", true))
            .await
            .unwrap();
        assert_eq!(created, PlaylistId(4));

        let form = PlaylistForm::edit(api, PlaylistId(4));
        let draft = form.initial().await.unwrap();
        assert_eq!(draft.name, "Old");
        assert!(!draft.is_public);
        assert_eq!(form.submit(&draft).await.unwrap(), PlaylistId(4));
        assert_eq!(transport.requests()[2], ("PUT".to_string(), "/playlists/4".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn form_second_submit_while_running_sends_nothing() {
        let transport = ScriptedTransport::delayed(Duration::from_millis(20));
        transport
            .reply(201, r#"{"playlist": {"id": 4}}"#)
            .reply(201, r#"{"playlist": {"id": 5}}"#);
        let form = PlaylistForm::create(signed_in_client(&transport).await);
        let draft = NewPlaylist::new("Roguelikes", true);

        let (first, second) = tokio::join!(form.submit(&draft), form.submit(&draft));
        assert_eq!(first.unwrap(), PlaylistId(4));
        assert_eq!(second.unwrap_err(), ApiError::InProgress);
        assert_eq!(transport.requests().len(), 1);
        assert!(!form.is_submitting());
        assert!(form.error().is_none());

        let abandoned = tokio::time::timeout(Duration::from_millis(5), form.submit(&draft)).await;
        assert!(abandoned.is_err());
        assert!(!form.is_submitting());
    }

    #[tokio::test]
    async fn form_refuses_blank_name() {
        let transport = ScriptedTransport::new();
        let form = PlaylistForm::create(signed_in_client(&transport).await);

        assert!(form.submit(&NewPlaylist::new("", true)).await.is_err());
        assert_eq!(form.error().as_deref(), Some("Playlist name is required"));
        assert!(transport.requests().is_empty());
    }
}
