use async_trait::async_trait;

use crate::types::User;

/// External identity provider: owns sessions and mints bearer credentials.
///
/// The client only needs to know who is signed in and how to get a fresh
/// token for them. Implementations wrap a hosted auth service; tests and the
/// CLI use a fixed identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the user of the current session, if any.
    ///
    /// Called once at startup; may hit the network to restore a session.
    async fn current_user(&self) -> anyhow::Result<Option<User>>;

    /// Short-lived bearer token for the signed-in user.
    ///
    /// `force_refresh` asks the provider to mint a new token rather than
    /// return a cached one.
    async fn id_token(&self, force_refresh: bool) -> anyhow::Result<String>;

    /// Sign in with email and password, returning the new user.
    async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<User>;

    /// Create an account and sign in as it.
    async fn sign_up(&self, email: &str, password: &str) -> anyhow::Result<User>;

    /// End the current session.
    async fn sign_out(&self) -> anyhow::Result<()>;
}
