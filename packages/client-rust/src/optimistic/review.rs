//! Review authoring and the user's review list.

use std::collections::HashSet;
use std::sync::Arc;

use crosspoint_core::models::{Game, NewReview, Review, ReviewUpdate};
use crosspoint_core::validation::validate_rating;
use crosspoint_core::{GameId, ReviewId};
use parking_lot::Mutex;
use tracing::warn;

use super::OnDrop;
use crate::api::ApiClient;
use crate::error::ApiError;

/// Whether submitting creates a review or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewMode {
    Create,
    Edit(ReviewId),
}

#[derive(Debug, Default)]
struct EditorState {
    game: Option<Game>,
    existing: Option<Review>,
    submitting: bool,
    error: Option<String>,
}

/// Create-or-edit review page for one game.
#[derive(Debug)]
pub struct ReviewEditor {
    api: Arc<ApiClient>,
    game_id: GameId,
    state: Mutex<EditorState>,
}

impl ReviewEditor {
    #[must_use]
    pub fn new(api: Arc<ApiClient>, game_id: GameId) -> Self {
        Self {
            api,
            game_id,
            state: Mutex::new(EditorState::default()),
        }
    }

    /// Loads the game and the user's existing review of it.
    ///
    /// Failing to list the user's reviews is not fatal: the editor falls
    /// back to create mode.
    ///
    /// # Errors
    ///
    /// Propagates the error when the game itself cannot be loaded.
    pub async fn load(&self) -> Result<ReviewMode, ApiError> {
        let game = match self.api.game(self.game_id).await {
            Ok(game) => game,
            Err(err) => {
                self.state.lock().error = Some(err.to_string());
                return Err(err);
            }
        };
        let existing = match self.api.my_reviews().await {
            Ok(list) => list.for_game(self.game_id).cloned(),
            Err(err) => {
                warn!(game = %self.game_id, error = %err, "could not load my reviews, assuming none");
                None
            }
        };
        let mut state = self.state.lock();
        state.game = Some(game);
        state.existing = existing;
        state.error = None;
        Ok(mode_of(&state))
    }

    #[must_use]
    pub fn mode(&self) -> ReviewMode {
        mode_of(&self.state.lock())
    }

    #[must_use]
    pub fn game(&self) -> Option<Game> {
        self.state.lock().game.clone()
    }

    #[must_use]
    pub fn existing(&self) -> Option<Review> {
        self.state.lock().existing.clone()
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.state.lock().submitting
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    /// Validates the rating, then creates or updates the review. Returns the
    /// mode the submission ran in; after a create the editor reloads the
    /// user's reviews so the next submit edits the new one.
    ///
    /// # Errors
    ///
    /// `ApiError::Validation` for a rating outside 0 to 10 in half steps
    /// (no request is sent), `ApiError::InProgress` while an earlier submit
    /// is still running, or the API error.
    pub async fn submit(&self, rating: f64, text: &str) -> Result<ReviewMode, ApiError> {
        if let Some(message) = validate_rating(rating).message() {
            let err = ApiError::validation(message);
            self.state.lock().error = Some(err.to_string());
            return Err(err);
        }
        let mode = {
            let mut state = self.state.lock();
            if state.submitting {
                return Err(ApiError::InProgress);
            }
            state.submitting = true;
            state.error = None;
            mode_of(&state)
        };
        let _submitting = OnDrop(|| self.state.lock().submitting = false);
        let review_text = text.trim().to_string();
        let result = match mode {
            ReviewMode::Create => {
                self.api
                    .create_review(&NewReview {
                        game_id: self.game_id,
                        rating,
                        review_text,
                    })
                    .await
            }
            ReviewMode::Edit(id) => {
                self.api
                    .update_review(id, &ReviewUpdate {
                        rating,
                        review_text,
                    })
                    .await
            }
        };
        if let Err(err) = result {
            self.state.lock().error = Some(err.to_string());
            return Err(err);
        }
        if mode == ReviewMode::Create {
            match self.api.my_reviews().await {
                Ok(list) => self.state.lock().existing = list.for_game(self.game_id).cloned(),
                Err(err) => {
                    warn!(game = %self.game_id, error = %err, "review created but list reload failed");
                }
            }
        }
        Ok(mode)
    }

    /// Deletes the existing review. A no-op in create mode.
    ///
    /// # Errors
    ///
    /// Returns the API error, also kept as [`error`](Self::error).
    pub async fn delete(&self) -> Result<(), ApiError> {
        let ReviewMode::Edit(id) = self.mode() else {
            return Ok(());
        };
        let result = self.api.delete_review(id).await;
        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                state.existing = None;
                state.error = None;
                Ok(())
            }
            Err(err) => {
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

fn mode_of(state: &EditorState) -> ReviewMode {
    state
        .existing
        .as_ref()
        .map_or(ReviewMode::Create, |r| ReviewMode::Edit(r.id))
}

/// The signed-in user's reviews with optimistic deletion.
#[derive(Debug)]
pub struct MyReviews {
    api: Arc<ApiClient>,
    reviews: Mutex<Vec<Review>>,
    deleting: Mutex<HashSet<ReviewId>>,
    error: Mutex<Option<String>>,
}

impl MyReviews {
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            reviews: Mutex::new(Vec::new()),
            deleting: Mutex::new(HashSet::new()),
            error: Mutex::new(None),
        }
    }

    /// # Errors
    ///
    /// Propagates the API error, also kept as [`error`](Self::error).
    pub async fn load(&self) -> Result<(), ApiError> {
        match self.api.my_reviews().await {
            Ok(list) => {
                *self.reviews.lock() = list.reviews;
                *self.error.lock() = None;
                Ok(())
            }
            Err(err) => {
                *self.error.lock() = Some(err.to_string());
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn reviews(&self) -> Vec<Review> {
        self.reviews.lock().clone()
    }

    #[must_use]
    pub fn is_deleting(&self, id: ReviewId) -> bool {
        self.deleting.lock().contains(&id)
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.error.lock().clone()
    }

    /// Removes the review from the list at once and deletes it remotely,
    /// restoring it on failure.
    ///
    /// # Errors
    ///
    /// Returns the API error after restoring the review.
    pub async fn delete(&self, id: ReviewId) -> Result<(), ApiError> {
        if !self.deleting.lock().insert(id) {
            return Ok(());
        }
        let _deleting = OnDrop(|| {
            self.deleting.lock().remove(&id);
        });
        *self.error.lock() = None;
        let removed = {
            let mut reviews = self.reviews.lock();
            reviews
                .iter()
                .position(|r| r.id == id)
                .map(|index| (index, reviews.remove(index)))
        };

        let result = self.api.delete_review(id).await;
        if let Err(err) = &result {
            warn!(review = %id, error = %err, "delete failed, restoring review");
            if let Some((index, review)) = removed {
                let mut reviews = self.reviews.lock();
                if !reviews.iter().any(|r| r.id == id) {
                    let index = index.min(reviews.len());
                    reviews.insert(index, review);
                }
            }
            *self.error.lock() = Some(err.to_string());
        }
        result
    }
}
