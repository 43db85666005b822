use serde::{Deserialize, Deserializer, Serialize};

use crate::platform::{combine_special_platforms, format_platform_name};
use crate::types::GameId;

/// IGDB image size tokens. Catalog URLs come back as thumbnails
/// (`.../t_thumb/...`) and are rewritten to the size a view needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Thumb,
    CoverSmall,
    CoverBig,
    Hd1080,
}

impl ImageSize {
    fn token(self) -> &'static str {
        match self {
            Self::Thumb => "t_thumb",
            Self::CoverSmall => "t_cover_small",
            Self::CoverBig => "t_cover_big",
            Self::Hd1080 => "t_1080p",
        }
    }
}

/// Cover art or screenshot reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Image {
    /// The image URL rewritten to `size`, if the server sent one.
    #[must_use]
    pub fn sized(&self, size: ImageSize) -> Option<String> {
        self.url
            .as_deref()
            .map(|url| url.replacen(ImageSize::Thumb.token(), size.token(), 1))
    }
}

/// A `{ name }` reference such as a genre.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvolvedCompany {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub company: Option<Company>,
    #[serde(default)]
    pub developer: Option<bool>,
    #[serde(default)]
    pub publisher: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
}

impl Video {
    /// Watch URL on YouTube.
    #[must_use]
    pub fn watch_url(&self) -> Option<String> {
        self.video_id
            .as_deref()
            .map(|id| format!("https://www.youtube.com/watch?v={id}"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Website {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
    /// IGDB website category (1 = official, 13 = Steam, ...).
    #[serde(default, rename = "type")]
    pub kind: Option<u32>,
}

/// A catalog game, either a list entry or a full detail record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub cover: Option<Image>,
    /// Unix seconds.
    #[serde(default)]
    pub first_release_date: Option<i64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub rating_count: Option<u64>,
    #[serde(default)]
    pub aggregated_rating: Option<f64>,
    #[serde(default)]
    pub aggregated_rating_count: Option<u64>,
    #[serde(default)]
    pub genres: Vec<Named>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub involved_companies: Vec<InvolvedCompany>,
    #[serde(default)]
    pub videos: Vec<Video>,
    #[serde(default)]
    pub screenshots: Vec<Image>,
    #[serde(default)]
    pub websites: Vec<Website>,
    #[serde(default)]
    pub steam_positive_reviews: Option<u64>,
    #[serde(default)]
    pub steam_negative_reviews: Option<u64>,
    #[serde(default)]
    pub steam_review_score: Option<f64>,
}

impl Game {
    /// Name to display; the catalog occasionally omits it.
    #[must_use]
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or("Untitled")
    }

    /// Cover URL at the requested size.
    #[must_use]
    pub fn cover_url(&self, size: ImageSize) -> Option<String> {
        self.cover.as_ref().and_then(|c| c.sized(size))
    }

    /// Short platform labels with Switch 1 and 2 merged.
    #[must_use]
    pub fn platform_labels(&self) -> Vec<String> {
        let names: Vec<String> = self
            .platforms
            .iter()
            .filter_map(|p| p.name.as_deref())
            .map(|n| format_platform_name(n).to_string())
            .collect();
        combine_special_platforms(names)
    }

    /// Names of companies credited as developer.
    #[must_use]
    pub fn developers(&self) -> Vec<&str> {
        self.companies_where(|c| c.developer.unwrap_or(false))
    }

    /// Names of companies credited as publisher.
    #[must_use]
    pub fn publishers(&self) -> Vec<&str> {
        self.companies_where(|c| c.publisher.unwrap_or(false))
    }

    fn companies_where(&self, pred: impl Fn(&InvolvedCompany) -> bool) -> Vec<&str> {
        self.involved_companies
            .iter()
            .filter(|c| pred(c))
            .filter_map(|c| c.company.as_ref()?.name.as_deref())
            .collect()
    }

    /// Share of positive Steam reviews in `[0, 1]`, when both counts exist.
    #[must_use]
    pub fn steam_positive_ratio(&self) -> Option<f64> {
        let pos = self.steam_positive_reviews?;
        let neg = self.steam_negative_reviews?;
        let total = pos + neg;
        if total == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(pos as f64 / total as f64)
    }
}

/// One page of a category listing or search.
///
/// Category endpoints may return a bare array; search returns an object with
/// `results` and an optional `has_more`/`count` continuation signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GamePage {
    pub results: Vec<Game>,
    pub has_more: Option<bool>,
    pub count: Option<u64>,
}

impl GamePage {
    /// Whether a larger page would return more rows.
    ///
    /// Falls back to "the page came back full" when the server sends no signal.
    #[must_use]
    pub fn can_load_more(&self, requested: usize) -> bool {
        match (self.has_more, self.count) {
            (Some(more), _) => more,
            (None, Some(count)) => usize::try_from(count).unwrap_or(usize::MAX) > self.results.len(),
            (None, None) => requested > 0 && self.results.len() >= requested,
        }
    }
}

impl<'de> Deserialize<'de> for GamePage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Paged {
            #[serde(alias = "games")]
            results: Vec<Game>,
            #[serde(default)]
            has_more: Option<bool>,
            #[serde(default)]
            count: Option<u64>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Bare(Vec<Game>),
            Paged(Paged),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Bare(results) => GamePage {
                results,
                has_more: None,
                count: None,
            },
            Wire::Paged(p) => GamePage {
                results: p.results,
                has_more: p.has_more,
                count: p.count,
            },
        })
    }
}

/// Body of `POST`/`DELETE /games/like`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeRequest {
    pub game_id: GameId,
}

/// Response of `GET /games/{id}/liked`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeStatus {
    #[serde(default)]
    pub liked: bool,
}

/// Response of `GET /games/liked`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LikedGames {
    #[serde(default)]
    pub liked_games: Vec<Game>,
}
