use std::fmt;

use crosspoint_core::models::{Game, GamePage, LikeRequest, LikeStatus, LikedGames};
use crosspoint_core::validation::validate_search_query;
use crosspoint_core::GameId;
use http::Method;

use super::ApiClient;
use crate::error::ApiError;
use crate::transport::ApiRequest;

/// Curated catalog listings shown on the explore and home pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExploreCategory {
    Upcoming,
    Trending,
    Recent,
    MostAnticipated,
    HiddenGems,
}

impl ExploreCategory {
    /// Every category, in page order.
    pub const ALL: [Self; 5] = [
        Self::Upcoming,
        Self::Trending,
        Self::Recent,
        Self::MostAnticipated,
        Self::HiddenGems,
    ];

    /// Key used in view models and cache descriptors.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Trending => "trending",
            Self::Recent => "recent",
            Self::MostAnticipated => "mostAnticipated",
            Self::HiddenGems => "hiddenGems",
        }
    }

    /// URL path segment.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Trending => "trending",
            Self::Recent => "recent",
            Self::MostAnticipated => "most-anticipated",
            Self::HiddenGems => "hidden-gems",
        }
    }

    /// Parses either the view-model name or the URL slug.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == value || c.slug() == value)
    }
}

impl fmt::Display for ExploreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ApiClient {
    /// `GET /games/search?q=&limit=`.
    ///
    /// # Errors
    ///
    /// `ApiError::Validation` for a blank query (no request is sent);
    /// otherwise transport, server and decode errors.
    pub async fn search_games(&self, query: &str, limit: usize) -> Result<GamePage, ApiError> {
        if let Some(message) = validate_search_query(query).message() {
            return Err(ApiError::validation(message));
        }
        self.anonymous(
            ApiRequest::get("/games/search")
                .query_param("q", query.trim())
                .query_param("limit", limit),
        )
        .await
    }

    /// `GET /games/{id}`.
    ///
    /// # Errors
    ///
    /// Transport, server and decode errors.
    pub async fn game(&self, id: GameId) -> Result<Game, ApiError> {
        self.anonymous(ApiRequest::get(format!("/games/{id}"))).await
    }

    /// `GET /games/explore/{category}?limit=`.
    ///
    /// # Errors
    ///
    /// Transport, server and decode errors.
    pub async fn explore(
        &self,
        category: ExploreCategory,
        limit: usize,
    ) -> Result<GamePage, ApiError> {
        self.anonymous(
            ApiRequest::get(format!("/games/explore/{}", category.slug()))
                .query_param("limit", limit),
        )
        .await
    }

    /// `POST /games/like`.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` when signed out; otherwise transport and server errors.
    pub async fn like_game(&self, id: GameId) -> Result<(), ApiError> {
        self.authenticated_unit(like_request(Method::POST, id)).await
    }

    /// `DELETE /games/like`.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` when signed out; otherwise transport and server errors.
    pub async fn unlike_game(&self, id: GameId) -> Result<(), ApiError> {
        self.authenticated_unit(like_request(Method::DELETE, id)).await
    }

    /// `GET /games/{id}/liked`.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` when signed out; otherwise transport, server and decode errors.
    pub async fn is_liked(&self, id: GameId) -> Result<bool, ApiError> {
        let status: LikeStatus = self
            .authenticated(ApiRequest::get(format!("/games/{id}/liked")))
            .await?;
        Ok(status.liked)
    }

    /// `GET /games/liked`.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` when signed out; otherwise transport, server and decode errors.
    pub async fn liked_games(&self) -> Result<Vec<Game>, ApiError> {
        let liked: LikedGames = self.authenticated(ApiRequest::get("/games/liked")).await?;
        Ok(liked.liked_games)
    }

    /// `POST /users/me/init`: ensures a server-side profile exists for the signed-in user.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` when signed out; otherwise transport and server errors.
    pub async fn init_user(&self) -> Result<(), ApiError> {
        self.authenticated_unit(ApiRequest::new(Method::POST, "/users/me/init"))
            .await
    }
}

fn like_request(method: Method, game_id: GameId) -> ApiRequest {
    ApiRequest::new(method, "/games/like").json(serde_json::json!(LikeRequest { game_id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{signed_in_client, ScriptedTransport};

    #[test]
    fn categories_round_trip_through_parse() {
        for category in ExploreCategory::ALL {
            assert_eq!(ExploreCategory::parse(category.name()), Some(category));
            assert_eq!(ExploreCategory::parse(category.slug()), Some(category));
        }
        assert_eq!(ExploreCategory::parse("bogus"), None);
    }

    #[tokio::test]
    async fn like_sends_game_id_body() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"success": true}"#);
        let api = signed_in_client(&transport).await;

        api.like_game(GameId(42)).await.unwrap();

        let seen = transport.seen.lock();
        assert_eq!(seen[0].method, Method::POST);
        assert_eq!(seen[0].path, "/games/like");
        assert_eq!(seen[0].body, Some(serde_json::json!({"game_id": 42})));
    }

    #[tokio::test]
    async fn blank_search_never_hits_network() {
        let transport = ScriptedTransport::new();
        let api = signed_in_client(&transport).await;

        let err = api.search_games("   ", 50).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn explore_uses_slug_and_limit() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"[{"id": 1}]"#);
        let api = signed_in_client(&transport).await;

        let page = api.explore(ExploreCategory::HiddenGems, 20).await.unwrap();
        assert_eq!(page.results.len(), 1);
        let seen = transport.seen.lock();
        assert_eq!(seen[0].path, "/games/explore/hidden-gems");
        assert_eq!(seen[0].query, vec![("limit".to_string(), "20".to_string())]);
    }
}
