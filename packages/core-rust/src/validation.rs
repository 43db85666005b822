//! Client-side input checks run before any request is issued.

use crate::models::{NewPlaylist, NewReview, ReviewUpdate};

/// Highest rating the review form accepts.
pub const MAX_RATING: f64 = 10.0;

/// Result of validating user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The input may be submitted.
    Valid,
    /// The input violates one or more constraints.
    Invalid {
        /// Human-readable descriptions of each failure.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// All failure messages joined for display.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Valid => None,
            Self::Invalid { errors } => Some(errors.join("; ")),
        }
    }

    fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            Self::Valid
        } else {
            Self::Invalid { errors }
        }
    }
}

/// A playlist needs a non-blank name.
#[must_use]
pub fn validate_playlist(playlist: &NewPlaylist) -> ValidationResult {
    let mut errors = Vec::new();
    if playlist.name.trim().is_empty() {
        errors.push("Playlist name is required".to_string());
    }
    ValidationResult::from_errors(errors)
}

/// Ratings run from 0 to 10 in half-point steps.
#[must_use]
pub fn validate_rating(rating: f64) -> ValidationResult {
    let mut errors = Vec::new();
    if !rating.is_finite() || !(0.0..=MAX_RATING).contains(&rating) {
        errors.push(format!("Rating must be between 0 and {MAX_RATING}"));
    } else if (rating * 2.0).fract() != 0.0 {
        errors.push("Rating must be a multiple of 0.5".to_string());
    }
    ValidationResult::from_errors(errors)
}

#[must_use]
pub fn validate_new_review(review: &NewReview) -> ValidationResult {
    validate_rating(review.rating)
}

#[must_use]
pub fn validate_review_update(update: &ReviewUpdate) -> ValidationResult {
    validate_rating(update.rating)
}

/// Search text must contain something other than whitespace.
#[must_use]
pub fn validate_search_query(query: &str) -> ValidationResult {
    if query.trim().is_empty() {
        ValidationResult::Invalid {
            errors: vec!["Search query is empty".to_string()],
        }
    } else {
        ValidationResult::Valid
    }
}
