//! JSON view models mirrored from the catalog, playlist and review API.
//!
//! The client never owns canonical state: each type here is a snapshot of a
//! server record. Apart from identifiers, every field is optional and unknown
//! fields are ignored, so a partial or newer server payload still decodes.

pub mod game;
pub mod playlist;
pub mod review;

pub use game::{
    Company, Game, GamePage, Image, ImageSize, InvolvedCompany, LikeRequest,
    LikeStatus, LikedGames, Named, Platform, Video, Website,
};
pub use playlist::{
    AddGameRequest, NewPlaylist, Playlist, PlaylistEnvelope, PlaylistGame, PlaylistList,
};
pub use review::{NewReview, Review, ReviewList, ReviewUpdate};

