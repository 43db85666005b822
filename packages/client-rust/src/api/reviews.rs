use crosspoint_core::models::{NewReview, ReviewList, ReviewUpdate};
use crosspoint_core::validation::{validate_new_review, validate_review_update};
use crosspoint_core::{GameId, ReviewId};
use http::Method;

use super::ApiClient;
use crate::error::ApiError;
use crate::transport::ApiRequest;

impl ApiClient {
    /// `GET /reviews/me`.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` when signed out; otherwise transport, server and decode errors.
    pub async fn my_reviews(&self) -> Result<ReviewList, ApiError> {
        self.authenticated(ApiRequest::get("/reviews/me")).await
    }

    /// `GET /reviews/game/{game_id}`.
    ///
    /// # Errors
    ///
    /// Transport, server and decode errors.
    pub async fn game_reviews(&self, game_id: GameId) -> Result<ReviewList, ApiError> {
        self.anonymous(ApiRequest::get(format!("/reviews/game/{game_id}")))
            .await
    }

    /// `POST /reviews`.
    ///
    /// # Errors
    ///
    /// `ApiError::Validation` for an out-of-range rating (no request is sent),
    /// `ApiError::Unauthenticated` when signed out, then transport and server errors.
    pub async fn create_review(&self, review: &NewReview) -> Result<(), ApiError> {
        if let Some(message) = validate_new_review(review).message() {
            return Err(ApiError::validation(message));
        }
        self.authenticated_unit(ApiRequest::new(Method::POST, "/reviews").json(serde_json::json!(review)))
            .await
    }

    /// `PUT /reviews/{id}`.
    ///
    /// # Errors
    ///
    /// Same as [`create_review`](Self::create_review).
    pub async fn update_review(&self, id: ReviewId, update: &ReviewUpdate) -> Result<(), ApiError> {
        if let Some(message) = validate_review_update(update).message() {
            return Err(ApiError::validation(message));
        }
        self.authenticated_unit(
            ApiRequest::new(Method::PUT, format!("/reviews/{id}")).json(serde_json::json!(update)),
        )
        .await
    }

    /// `DELETE /reviews/{id}`.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` when signed out; otherwise transport and server errors.
    pub async fn delete_review(&self, id: ReviewId) -> Result<(), ApiError> {
        self.authenticated_unit(ApiRequest::new(Method::DELETE, format!("/reviews/{id}")))
            .await
    }
}
