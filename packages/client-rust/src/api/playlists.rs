use crosspoint_core::models::{
    AddGameRequest, NewPlaylist, Playlist, PlaylistEnvelope, PlaylistList,
};
use crosspoint_core::validation::validate_playlist;
use crosspoint_core::{GameId, PlaylistId};
use http::Method;

use super::ApiClient;
use crate::error::ApiError;
use crate::transport::ApiRequest;

impl ApiClient {
    /// `GET /playlists/me`.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` when signed out; otherwise transport, server and decode errors.
    pub async fn my_playlists(&self) -> Result<Vec<Playlist>, ApiError> {
        let list: PlaylistList = self.authenticated(ApiRequest::get("/playlists/me")).await?;
        Ok(list.playlists)
    }

    /// `GET /playlists/{id}`. Public playlists are readable signed out.
    ///
    /// # Errors
    ///
    /// Transport, server and decode errors.
    pub async fn playlist(&self, id: PlaylistId) -> Result<Playlist, ApiError> {
        let req = ApiRequest::get(format!("/playlists/{id}"));
        if self.session().is_signed_in() {
            self.authenticated(req).await
        } else {
            self.anonymous(req).await
        }
    }

    /// `POST /playlists`, returning the created playlist.
    ///
    /// # Errors
    ///
    /// `ApiError::Validation` for a blank name (no request is sent),
    /// `ApiError::Unauthenticated` when signed out, then transport, server and decode errors.
    pub async fn create_playlist(&self, playlist: &NewPlaylist) -> Result<Playlist, ApiError> {
        let body = checked_playlist(playlist)?;
        let created: PlaylistEnvelope = self
            .authenticated(ApiRequest::new(Method::POST, "/playlists").json(body))
            .await?;
        Ok(created.playlist)
    }

    /// `PUT /playlists/{id}`.
    ///
    /// # Errors
    ///
    /// Same as [`create_playlist`](Self::create_playlist), minus decode errors.
    pub async fn update_playlist(
        &self,
        id: PlaylistId,
        playlist: &NewPlaylist,
    ) -> Result<(), ApiError> {
        let body = checked_playlist(playlist)?;
        self.authenticated_unit(ApiRequest::new(Method::PUT, format!("/playlists/{id}")).json(body))
            .await
    }

    /// `DELETE /playlists/{id}`.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` when signed out; otherwise transport and server errors.
    pub async fn delete_playlist(&self, id: PlaylistId) -> Result<(), ApiError> {
        self.authenticated_unit(ApiRequest::new(Method::DELETE, format!("/playlists/{id}")))
            .await
    }

    /// `POST /playlists/{id}/games`.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` when signed out; otherwise transport and server errors.
    pub async fn add_game_to_playlist(
        &self,
        playlist: PlaylistId,
        game_id: GameId,
    ) -> Result<(), ApiError> {
        self.authenticated_unit(
            ApiRequest::new(Method::POST, format!("/playlists/{playlist}/games"))
                .json(serde_json::json!(AddGameRequest { game_id })),
        )
        .await
    }

    /// `DELETE /playlists/{id}/games/{game_id}`.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` when signed out; otherwise transport and server errors.
    pub async fn remove_game_from_playlist(
        &self,
        playlist: PlaylistId,
        game_id: GameId,
    ) -> Result<(), ApiError> {
        self.authenticated_unit(ApiRequest::new(
            Method::DELETE,
            format!("/playlists/{playlist}/games/{game_id}"),
        ))
        .await
    }
}

fn checked_playlist(playlist: &NewPlaylist) -> Result<serde_json::Value, ApiError> {
    let playlist = playlist.normalized();
    if let Some(message) = validate_playlist(&playlist).message() {
        return Err(ApiError::validation(message));
    }
    Ok(serde_json::json!(playlist))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{signed_in_client, ScriptedTransport};

    #[tokio::test]
    async fn create_unwraps_envelope_and_trims_name() {
        let transport = ScriptedTransport::new();
        transport.reply(
            201,
            r#"{"playlist": {"id": 9, "name": "Favorites", "is_public": true, "games": []}}"#,
        );
        let api = signed_in_client(&transport).await;

        let created = api
            .create_playlist(&NewPlaylist::new("  Favorites ", true))
            .await
            .unwrap();
        assert_eq!(created.id, PlaylistId(9));
        let seen = transport.seen.lock();
        assert_eq!(
            seen[0].body,
            Some(serde_json::json!({"name": "Favorites", "is_public": true}))
        );
    }

    #[tokio::test]
    async fn blank_name_is_refused_locally() {
        let transport = ScriptedTransport::new();
        let api = signed_in_client(&transport).await;

        let err = api
            .update_playlist(PlaylistId(1), &NewPlaylist::new("", false))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::validation("Playlist name is required"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn membership_paths() {
        let transport = ScriptedTransport::new();
        transport.reply(200, "{}").reply(204, "");
        let api = signed_in_client(&transport).await;

        api.add_game_to_playlist(PlaylistId(3), GameId(101)).await.unwrap();
        api.remove_game_from_playlist(PlaylistId(3), GameId(101)).await.unwrap();

        assert_eq!(
            transport.requests(),
            vec![
                ("POST".to_string(), "/playlists/3/games".to_string()),
                ("DELETE".to_string(), "/playlists/3/games/101".to_string()),
            ]
        );
    }
}
