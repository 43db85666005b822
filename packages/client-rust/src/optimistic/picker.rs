//! "Add to playlist" dialog state for one game.

use std::collections::HashSet;
use std::sync::Arc;

use crosspoint_core::models::{NewPlaylist, Playlist, PlaylistGame};
use crosspoint_core::validation::validate_playlist;
use crosspoint_core::{GameId, PlaylistId};
use parking_lot::Mutex;
use tracing::warn;

use super::collection::MyPlaylists;
use super::OnDrop;
use crate::api::ApiClient;
use crate::cache::RequestCache;
use crate::error::ApiError;

#[derive(Debug, Default)]
struct PickerState {
    playlists: Vec<Playlist>,
    /// Playlists shown as containing the game, confirmed or optimistic.
    marked: HashSet<PlaylistId>,
    pending: HashSet<PlaylistId>,
    creating: bool,
    error: Option<String>,
}

/// Lists the user's playlists and attaches one game to them.
///
/// When built [`with_cache`](Self::with_cache), confirmed changes are also
/// written into the cached "my playlists" list so other views update without
/// a refetch.
#[derive(Debug)]
pub struct PlaylistPicker {
    api: Arc<ApiClient>,
    game_id: GameId,
    cache: Option<RequestCache<Vec<Playlist>>>,
    state: Mutex<PickerState>,
}

impl PlaylistPicker {
    #[must_use]
    pub fn new(api: Arc<ApiClient>, game_id: GameId) -> Self {
        Self {
            api,
            game_id,
            cache: None,
            state: Mutex::new(PickerState::default()),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: RequestCache<Vec<Playlist>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fetches the user's playlists and marks those already holding the game.
    ///
    /// # Errors
    ///
    /// Propagates the API error, which is also kept as [`error`](Self::error).
    pub async fn load(&self) -> Result<(), ApiError> {
        match self.api.my_playlists().await {
            Ok(playlists) => {
                let mut state = self.state.lock();
                state.marked = playlists
                    .iter()
                    .filter(|p| p.contains(self.game_id))
                    .map(|p| p.id)
                    .collect();
                state.playlists = playlists;
                state.error = None;
                Ok(())
            }
            Err(err) => {
                self.state.lock().error = Some(err.to_string());
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    #[must_use]
    pub fn playlists(&self) -> Vec<Playlist> {
        self.state.lock().playlists.clone()
    }

    #[must_use]
    pub fn is_marked(&self, playlist: PlaylistId) -> bool {
        self.state.lock().marked.contains(&playlist)
    }

    #[must_use]
    pub fn is_pending(&self, playlist: PlaylistId) -> bool {
        self.state.lock().pending.contains(&playlist)
    }

    #[must_use]
    pub fn is_creating(&self) -> bool {
        self.state.lock().creating
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    /// Attaches the game to an existing playlist. A no-op when it is
    /// already marked or a request for it is pending.
    ///
    /// # Errors
    ///
    /// Returns the API error after rolling back the mark.
    pub async fn add_to(&self, playlist: PlaylistId) -> Result<(), ApiError> {
        {
            let mut state = self.state.lock();
            if state.marked.contains(&playlist) || state.pending.contains(&playlist) {
                return Ok(());
            }
            state.marked.insert(playlist);
            state.pending.insert(playlist);
            state.error = None;
        }
        self.attach(playlist).await
    }

    /// Creates a playlist and attaches the game to it.
    ///
    /// A failed create changes nothing locally. A failed attach leaves the
    /// new playlist listed without the game.
    ///
    /// # Errors
    ///
    /// `ApiError::Validation` for a blank name (no request is sent),
    /// `ApiError::InProgress` while an earlier create is still running, or
    /// the error of whichever call failed.
    pub async fn create_and_add(&self, draft: NewPlaylist) -> Result<Playlist, ApiError> {
        let draft = draft.normalized();
        if let Some(message) = validate_playlist(&draft).message() {
            let err = ApiError::validation(message);
            self.state.lock().error = Some(err.to_string());
            return Err(err);
        }
        {
            let mut state = self.state.lock();
            if state.creating {
                return Err(ApiError::InProgress);
            }
            state.creating = true;
            state.error = None;
        }
        let _creating = OnDrop(|| self.state.lock().creating = false);

        let created = match self.api.create_playlist(&draft).await {
            Ok(created) => created,
            Err(err) => {
                self.state.lock().error = Some(err.to_string());
                return Err(err);
            }
        };
        {
            let mut state = self.state.lock();
            state.playlists.insert(0, created.clone());
            state.marked.insert(created.id);
            state.pending.insert(created.id);
        }
        let listed = created.clone();
        self.write_through(move |list| {
            if !list.iter().any(|p| p.id == listed.id) {
                list.insert(0, listed);
            }
        });

        self.attach(created.id).await?;
        Ok(self
            .playlists()
            .into_iter()
            .find(|p| p.id == created.id)
            .unwrap_or(created))
    }

    async fn attach(&self, playlist: PlaylistId) -> Result<(), ApiError> {
        let result = self.api.add_game_to_playlist(playlist, self.game_id).await;
        let mut state = self.state.lock();
        state.pending.remove(&playlist);
        match result {
            Ok(()) => {
                if let Some(p) = state.playlists.iter_mut().find(|p| p.id == playlist) {
                    push_game(p, self.game_id);
                }
                drop(state);
                let game_id = self.game_id;
                self.write_through(move |list| {
                    if let Some(p) = list.iter_mut().find(|p| p.id == playlist) {
                        push_game(p, game_id);
                    }
                });
                Ok(())
            }
            Err(err) => {
                warn!(playlist = %playlist, game = %self.game_id, error = %err, "attach failed, rolling back");
                state.marked.remove(&playlist);
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn write_through(&self, edit: impl FnOnce(&mut Vec<Playlist>)) {
        if let Some(cache) = &self.cache {
            cache.update(&MyPlaylists::descriptor(), edit);
        }
    }
}

fn push_game(playlist: &mut Playlist, game_id: GameId) {
    if !playlist.contains(game_id) {
        playlist.games.push(PlaylistGame::reference(game_id));
    }
}
