//! Two-state optimistic control.
//!
//! ```text
//!  Settled(a) ──action──► Pending { previous: a, target: !a } ──ok──► Settled(!a)
//!                                   │
//!                                   └──err──► Settled(a) + error
//! ```
//!
//! The displayed value flips as soon as the action starts. While pending,
//! further actions are ignored.

use std::sync::Arc;

use async_trait::async_trait;
use crosspoint_core::{GameId, PlaylistId};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::auth::AuthSession;
use crate::error::ApiError;

/// Local state of a [`ToggleControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    Settled(bool),
    Pending { previous: bool, target: bool },
}

impl ToggleState {
    /// Value to render: the target while pending.
    #[must_use]
    pub fn displayed(self) -> bool {
        match self {
            Self::Settled(value) => value,
            Self::Pending { target, .. } => target,
        }
    }

    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// What happened to one toggle action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The server confirmed the new value.
    Committed(bool),
    /// The server refused; the previous value is back.
    Reverted { error: String },
    /// A mutation was already pending, or the value was already as requested.
    Ignored,
    /// Nobody is signed in. No state changed.
    SignInRequired,
    /// The control was detached before the response arrived.
    Detached,
}

/// Remote side of a toggle.
#[async_trait]
pub trait ToggleMutation: Send + Sync + 'static {
    /// Whether the action needs a signed-in user.
    fn requires_sign_in(&self) -> bool {
        true
    }

    /// Makes the server state equal `target`.
    async fn apply(&self, target: bool) -> Result<(), ApiError>;

    /// Short label for logs.
    fn label(&self) -> String;
}

struct Inner {
    state: ToggleState,
    error: Option<String>,
}

type ChangeCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Optimistic two-state control over a [`ToggleMutation`].
pub struct ToggleControl<M> {
    mutation: M,
    session: Arc<AuthSession>,
    inner: Mutex<Inner>,
    on_change: Option<ChangeCallback>,
    alive: CancellationToken,
}

impl<M: ToggleMutation> ToggleControl<M> {
    #[must_use]
    pub fn new(mutation: M, session: Arc<AuthSession>, initial: bool) -> Self {
        Self {
            mutation,
            session,
            inner: Mutex::new(Inner {
                state: ToggleState::Settled(initial),
                error: None,
            }),
            on_change: None,
            alive: CancellationToken::new(),
        }
    }

    /// Callback invoked with the new value after each confirmed change.
    #[must_use]
    pub fn with_on_change(mut self, callback: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn mutation(&self) -> &M {
        &self.mutation
    }

    #[must_use]
    pub fn state(&self) -> ToggleState {
        self.inner.lock().state
    }

    #[must_use]
    pub fn displayed(&self) -> bool {
        self.state().displayed()
    }

    /// Message of the last failed action. Cleared when the next one starts.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner.lock().error.clone()
    }

    /// Replaces the settled value with server truth. Ignored while pending.
    pub fn reset(&self, value: bool) {
        let mut inner = self.inner.lock();
        if !inner.state.is_pending() {
            inner.state = ToggleState::Settled(value);
        }
    }

    /// Stops committing responses. Pending requests still complete remotely.
    pub fn detach(&self) {
        self.alive.cancel();
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.alive.is_cancelled()
    }

    /// Drives the control to `value`; a no-op when already displayed.
    pub async fn set(&self, value: bool) -> ToggleOutcome {
        if self.displayed() == value {
            return ToggleOutcome::Ignored;
        }
        self.toggle().await
    }

    /// Flips the control optimistically and reconciles with the server.
    pub async fn toggle(&self) -> ToggleOutcome {
        if self.is_detached() {
            return ToggleOutcome::Detached;
        }
        if self.mutation.requires_sign_in() && !self.session.is_signed_in() {
            return ToggleOutcome::SignInRequired;
        }
        let (previous, target) = {
            let mut inner = self.inner.lock();
            let ToggleState::Settled(current) = inner.state else {
                return ToggleOutcome::Ignored;
            };
            inner.state = ToggleState::Pending {
                previous: current,
                target: !current,
            };
            inner.error = None;
            (current, !current)
        };
        let pending = PendingGuard {
            inner: &self.inner,
            previous,
            armed: true,
        };
        debug!(mutation = %self.mutation.label(), target, "optimistic toggle");

        let result = self.mutation.apply(target).await;
        pending.disarm();
        if self.is_detached() {
            debug!(mutation = %self.mutation.label(), "response after detach dropped");
            return ToggleOutcome::Detached;
        }

        match result {
            Ok(()) => {
                {
                    let mut inner = self.inner.lock();
                    inner.state = ToggleState::Settled(target);
                    inner.error = None;
                }
                if let Some(callback) = &self.on_change {
                    callback(target);
                }
                ToggleOutcome::Committed(target)
            }
            Err(err) => {
                warn!(mutation = %self.mutation.label(), error = %err, "reverting optimistic toggle");
                let message = err.to_string();
                let mut inner = self.inner.lock();
                inner.state = ToggleState::Settled(previous);
                inner.error = Some(message.clone());
                ToggleOutcome::Reverted { error: message }
            }
        }
    }
}

/// Puts a pending control back to its previous value when the toggle future
/// is dropped before the response arrives.
struct PendingGuard<'a> {
    inner: &'a Mutex<Inner>,
    previous: bool,
    armed: bool,
}

impl PendingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.state.is_pending() {
            inner.state = ToggleState::Settled(self.previous);
        }
    }
}

impl<M> Drop for ToggleControl<M> {
    fn drop(&mut self) {
        self.alive.cancel();
    }
}

impl<M: ToggleMutation> std::fmt::Debug for ToggleControl<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ToggleControl")
            .field("mutation", &self.mutation.label())
            .field("state", &inner.state)
            .field("error", &inner.error)
            .finish_non_exhaustive()
    }
}

/// Like or unlike one game.
#[derive(Debug, Clone)]
pub struct LikeMutation {
    api: Arc<ApiClient>,
    game_id: GameId,
}

impl LikeMutation {
    #[must_use]
    pub fn new(api: Arc<ApiClient>, game_id: GameId) -> Self {
        Self { api, game_id }
    }

    #[must_use]
    pub fn game_id(&self) -> GameId {
        self.game_id
    }
}

#[async_trait]
impl ToggleMutation for LikeMutation {
    async fn apply(&self, target: bool) -> Result<(), ApiError> {
        if target {
            self.api.like_game(self.game_id).await
        } else {
            self.api.unlike_game(self.game_id).await
        }
    }

    fn label(&self) -> String {
        format!("like game {}", self.game_id)
    }
}

/// Like button state for one game.
pub type LikeToggle = ToggleControl<LikeMutation>;

impl ToggleControl<LikeMutation> {
    /// Builds the control, reading the initial state from the server when signed in.
    ///
    /// A failed lookup is logged and the control starts unliked.
    pub async fn mount(api: Arc<ApiClient>, game_id: GameId) -> Self {
        let session = Arc::clone(api.session());
        let initial = if session.is_signed_in() {
            match api.is_liked(game_id).await {
                Ok(liked) => liked,
                Err(err) => {
                    warn!(game = %game_id, error = %err, "could not load like status");
                    false
                }
            }
        } else {
            false
        };
        Self::new(LikeMutation::new(api, game_id), session, initial)
    }

    pub async fn like(&self) -> ToggleOutcome {
        self.set(true).await
    }

    pub async fn unlike(&self) -> ToggleOutcome {
        self.set(false).await
    }
}

/// Add or remove one game from one playlist.
#[derive(Debug, Clone)]
pub struct MembershipMutation {
    api: Arc<ApiClient>,
    playlist_id: PlaylistId,
    game_id: GameId,
}

impl MembershipMutation {
    #[must_use]
    pub fn new(api: Arc<ApiClient>, playlist_id: PlaylistId, game_id: GameId) -> Self {
        Self {
            api,
            playlist_id,
            game_id,
        }
    }
}

#[async_trait]
impl ToggleMutation for MembershipMutation {
    async fn apply(&self, target: bool) -> Result<(), ApiError> {
        if target {
            self.api
                .add_game_to_playlist(self.playlist_id, self.game_id)
                .await
        } else {
            self.api
                .remove_game_from_playlist(self.playlist_id, self.game_id)
                .await
        }
    }

    fn label(&self) -> String {
        format!("game {} in playlist {}", self.game_id, self.playlist_id)
    }
}
