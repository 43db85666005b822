//! Typed access to the CrossPoint REST API.
//!
//! Catalog reads are anonymous. Every mutation and every `me` read goes
//! through [`ApiClient::authenticated`], which refuses locally when nobody is
//! signed in and otherwise attaches a fresh bearer token.

mod games;
mod playlists;
mod reviews;

pub use games::ExploreCategory;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use crate::auth::AuthSession;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::transport::{build_transport_pipeline, ApiRequest, ApiResponse, Transport};

/// Shared API client. Cheap to share behind `Arc`.
pub struct ApiClient {
    transport: Mutex<Transport>,
    session: Arc<AuthSession>,
}

impl ApiClient {
    /// Client over the real HTTP pipeline described by `config`.
    #[must_use]
    pub fn new(config: &ClientConfig, session: Arc<AuthSession>) -> Self {
        Self::with_transport(build_transport_pipeline(config), session)
    }

    /// Client over an arbitrary transport stack.
    #[must_use]
    pub fn with_transport(transport: Transport, session: Arc<AuthSession>) -> Self {
        Self {
            transport: Mutex::new(transport),
            session,
        }
    }

    /// The session used for bearer tokens.
    #[must_use]
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    async fn send(&self, req: ApiRequest) -> Result<ApiResponse, ApiError> {
        let svc = self.transport.lock().clone();
        svc.oneshot(req).await
    }

    /// Anonymous request decoded as `T`.
    ///
    /// # Errors
    ///
    /// Transport, server and decode errors per the API error contract.
    pub async fn anonymous<T: DeserializeOwned>(&self, req: ApiRequest) -> Result<T, ApiError> {
        self.send(req).await?.into_json()
    }

    /// Authenticated request decoded as `T`.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` before any I/O when nobody is signed in;
    /// otherwise transport, server and decode errors.
    pub async fn authenticated<T: DeserializeOwned>(&self, req: ApiRequest) -> Result<T, ApiError> {
        let token = self.session.bearer_token().await?;
        self.send(req.bearer(token)).await?.into_json()
    }

    /// Authenticated request whose success body is ignored.
    ///
    /// # Errors
    ///
    /// Same as [`authenticated`](Self::authenticated), minus decode errors.
    pub async fn authenticated_unit(&self, req: ApiRequest) -> Result<(), ApiError> {
        let token = self.session.bearer_token().await?;
        let resp = self.send(req.bearer(token)).await?;
        if resp.is_success() {
            Ok(())
        } else {
            Err(ApiError::from_status(resp.status, &resp.body))
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
