use async_trait::async_trait;
use crosspoint_core::{IdentityProvider, User};
use parking_lot::Mutex;

/// Identity provider with one fixed account and a fixed bearer token.
///
/// Used by the CLI (token passed on the command line) and by tests. Any
/// email/password signs in as the configured account.
#[derive(Debug)]
pub struct StaticIdentity {
    account: Option<User>,
    token: String,
    signed_in: Mutex<bool>,
}

impl StaticIdentity {
    /// Provider whose session is already signed in as `user`.
    #[must_use]
    pub fn signed_in(user: User, token: impl Into<String>) -> Self {
        Self {
            account: Some(user),
            token: token.into(),
            signed_in: Mutex::new(true),
        }
    }

    /// Provider that knows `user` but starts signed out.
    #[must_use]
    pub fn signed_out(user: User, token: impl Into<String>) -> Self {
        Self {
            account: Some(user),
            token: token.into(),
            signed_in: Mutex::new(false),
        }
    }

    /// Provider with no account at all; every sign-in fails.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            account: None,
            token: String::new(),
            signed_in: Mutex::new(false),
        }
    }

    fn account(&self) -> anyhow::Result<User> {
        self.account
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no account configured"))
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> anyhow::Result<Option<User>> {
        if *self.signed_in.lock() {
            Ok(self.account.clone())
        } else {
            Ok(None)
        }
    }

    async fn id_token(&self, _force_refresh: bool) -> anyhow::Result<String> {
        if *self.signed_in.lock() {
            Ok(self.token.clone())
        } else {
            Err(anyhow::anyhow!("no active session"))
        }
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> anyhow::Result<User> {
        let user = self.account()?;
        *self.signed_in.lock() = true;
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> anyhow::Result<User> {
        self.sign_in(email, password).await
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        *self.signed_in.lock() = false;
        Ok(())
    }
}
