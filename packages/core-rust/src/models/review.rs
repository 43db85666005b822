use serde::{Deserialize, Serialize};

use super::game::Image;
use crate::types::{GameId, ReviewId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub game_id: GameId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub cover: Option<Image>,
    /// 0 to 10 in half steps.
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_text: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Review {
    #[must_use]
    pub fn is_by(&self, user: &UserId) -> bool {
        self.user_id.as_ref() == Some(user)
    }
}

/// Body of `POST /reviews`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub game_id: GameId,
    pub rating: f64,
    pub review_text: String,
}

/// Body of `PUT /reviews/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewUpdate {
    pub rating: f64,
    pub review_text: String,
}

/// `{ "reviews": [...] }` wrapper for user and game review listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewList {
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl ReviewList {
    /// The review `user` wrote, if any.
    #[must_use]
    pub fn by_user(&self, user: &UserId) -> Option<&Review> {
        self.reviews.iter().find(|r| r.is_by(user))
    }

    /// The review for `game`, if any.
    #[must_use]
    pub fn for_game(&self, game: GameId) -> Option<&Review> {
        self.reviews.iter().find(|r| r.game_id == game)
    }
}
