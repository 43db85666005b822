//! Optimistic mutations: local state changes first, the server confirms or
//! the change is rolled back.
//!
//! Every control here keeps its error as state (`error()`), clears it when
//! the next attempt starts, and never leaves an entity in a state the server
//! did not confirm.

mod collection;
mod picker;
mod review;
mod toggle;

pub use collection::{MyPlaylists, PlaylistDetail, PlaylistForm, USER_CATEGORY};
pub use picker::PlaylistPicker;
pub use review::{MyReviews, ReviewEditor, ReviewMode};
pub use toggle::{
    LikeMutation, LikeToggle, MembershipMutation, ToggleControl, ToggleMutation, ToggleOutcome,
    ToggleState,
};

/// Runs the closure when dropped. Clears in-progress markers even when the
/// future that set them is dropped before its request completes.
struct OnDrop<F: FnMut()>(F);

impl<F: FnMut()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        (self.0)();
    }
}
