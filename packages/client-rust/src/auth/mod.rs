//! Authentication session: who is signed in, and how to prove it.
//!
//! [`AuthSession`] is passed explicitly (`Arc<AuthSession>`) to everything
//! that needs identity. It caches the current user in an `ArcSwapOption` so
//! reads are lock-free, and fans out user changes to registered listeners.

mod static_identity;

pub use static_identity::StaticIdentity;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use crosspoint_core::{IdentityProvider, User};
use dashmap::DashMap;

use crate::error::ApiError;

type Listener = Arc<dyn Fn(Option<&User>) + Send + Sync>;

/// Current-user state plus bearer-token access for authenticated requests.
pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    user: ArcSwapOption<User>,
    loading: AtomicBool,
    listeners: Arc<DashMap<u64, Listener>>,
    next_listener_id: AtomicU64,
}

impl AuthSession {
    /// Creates a session in the loading state; call [`resolve`](Self::resolve) to restore it.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            user: ArcSwapOption::empty(),
            loading: AtomicBool::new(true),
            listeners: Arc::new(DashMap::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Asks the provider for the current session and publishes the result.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Identity` if the provider fails. The session still
    /// leaves the loading state, signed out.
    pub async fn resolve(&self) -> Result<Option<User>, ApiError> {
        let result = self.provider.current_user().await;
        self.loading.store(false, Ordering::SeqCst);
        match result {
            Ok(user) => {
                self.publish(user.clone());
                Ok(user)
            }
            Err(e) => {
                self.publish(None);
                Err(identity_error(&e))
            }
        }
    }

    /// Snapshot of the signed-in user.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.user.load_full().map(|u| (*u).clone())
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.user.load().is_some()
    }

    /// True until the initial session resolution finishes.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Fresh bearer credential for the signed-in user.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` when nobody is signed in (checked before
    /// the provider is asked), `ApiError::Identity` if the provider fails.
    pub async fn bearer_token(&self) -> Result<String, ApiError> {
        if !self.is_signed_in() {
            return Err(ApiError::Unauthenticated);
        }
        self.provider
            .id_token(false)
            .await
            .map_err(|e| identity_error(&e))
    }

    /// Signs in and publishes the new user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Identity` with the provider's message on failure.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let user = self
            .provider
            .sign_in(email, password)
            .await
            .map_err(|e| identity_error(&e))?;
        self.publish(Some(user.clone()));
        Ok(user)
    }

    /// Creates an account, signs in as it and publishes the new user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Identity` with the provider's message on failure.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let user = self
            .provider
            .sign_up(email, password)
            .await
            .map_err(|e| identity_error(&e))?;
        self.publish(Some(user.clone()));
        Ok(user)
    }

    /// Ends the session and publishes the signed-out state.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Identity` if the provider fails; the local user is kept.
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        self.provider
            .sign_out()
            .await
            .map_err(|e| identity_error(&e))?;
        self.publish(None);
        Ok(())
    }

    /// Registers a callback fired whenever the signed-in user changes.
    ///
    /// The callback stays registered until the returned guard is dropped.
    #[must_use]
    pub fn on_change(
        &self,
        callback: impl Fn(Option<&User>) + Send + Sync + 'static,
    ) -> ListenerGuard {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, Arc::new(callback));
        ListenerGuard {
            id,
            listeners: Arc::clone(&self.listeners),
        }
    }

    /// Number of registered change listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn publish(&self, user: Option<User>) {
        let previous = self.user.load_full();
        if previous.as_deref() == user.as_ref() {
            return;
        }
        tracing::debug!(
            uid = user.as_ref().map_or("", |u| u.uid.0.as_str()),
            "auth user changed"
        );
        self.user.store(user.clone().map(Arc::new));

        // Collect first so listeners may register or drop guards while being called.
        let listeners: Vec<Listener> = self.listeners.iter().map(|l| Arc::clone(l.value())).collect();
        for listener in listeners {
            listener(user.as_ref());
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("user", &self.user.load_full())
            .field("loading", &self.is_loading())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

/// RAII registration of an [`AuthSession::on_change`] callback.
pub struct ListenerGuard {
    id: u64,
    listeners: Arc<DashMap<u64, Listener>>,
}

impl std::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.listeners.remove(&self.id);
    }
}

fn identity_error(err: &anyhow::Error) -> ApiError {
    ApiError::Identity {
        message: format!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use crosspoint_core::UserId;

    use super::*;

    fn user(uid: &str) -> User {
        User {
            uid: UserId(uid.to_string()),
            email: None,
            display_name: None,
        }
    }

    #[tokio::test]
    async fn resolve_leaves_loading_state() {
        let session = AuthSession::new(Arc::new(StaticIdentity::signed_in(user("u-1"), "tok")));
        assert!(session.is_loading());
        assert!(!session.is_signed_in());

        let resolved = session.resolve().await.unwrap();
        assert_eq!(resolved, Some(user("u-1")));
        assert!(!session.is_loading());
        assert!(session.is_signed_in());
    }

    #[tokio::test]
    async fn bearer_token_refused_when_signed_out() {
        let session = AuthSession::new(Arc::new(StaticIdentity::signed_out(user("u-1"), "tok")));
        session.resolve().await.unwrap();
        assert_eq!(session.bearer_token().await, Err(ApiError::Unauthenticated));

        session.sign_in("a@example.com", "pw").await.unwrap();
        assert_eq!(session.bearer_token().await.unwrap(), "tok");
    }

    #[tokio::test]
    async fn listeners_fire_on_change_until_dropped() {
        let session = AuthSession::new(Arc::new(StaticIdentity::signed_out(user("u-1"), "tok")));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let guard = session.on_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        session.sign_in("a@example.com", "pw").await.unwrap();
        // Same user again is not a change.
        session.sign_in("a@example.com", "pw").await.unwrap();
        session.sign_out().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        drop(guard);
        assert_eq!(session.listener_count(), 0);
        session.sign_in("a@example.com", "pw").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
