use serde::{Deserialize, Serialize};

use super::game::Image;
use crate::types::{GameId, PlaylistId, UserId};

/// A game reference inside a playlist, in playlist order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistGame {
    pub game_id: GameId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cover: Option<Image>,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub added_at: Option<String>,
}

impl PlaylistGame {
    /// Bare membership entry, used when the client records an attach it just confirmed.
    #[must_use]
    pub fn reference(game_id: GameId) -> Self {
        Self {
            game_id,
            name: None,
            cover: None,
            order: None,
            added_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub games: Vec<PlaylistGame>,
}

impl Playlist {
    #[must_use]
    pub fn contains(&self, game_id: GameId) -> bool {
        self.games.iter().any(|g| g.game_id == game_id)
    }

    /// Owner check; an absent owner never matches.
    #[must_use]
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.user_id.as_ref() == Some(user)
    }

    /// Playlists are public unless the server says otherwise.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.is_public.unwrap_or(true)
    }
}

/// Body of `POST /playlists` and `PUT /playlists/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlaylist {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    pub is_public: bool,
}

impl NewPlaylist {
    #[must_use]
    pub fn new(name: impl Into<String>, is_public: bool) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_public,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Trims the name and drops a blank description, as submitted by a form.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            is_public: self.is_public,
        }
    }
}

/// `{ "playlist": ... }` wrapper returned by create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEnvelope {
    pub playlist: Playlist,
}

/// `{ "playlists": [...] }` wrapper returned by `GET /playlists/me`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistList {
    #[serde(default)]
    pub playlists: Vec<Playlist>,
}

/// Body of `POST /playlists/{id}/games`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddGameRequest {
    pub game_id: GameId,
}
