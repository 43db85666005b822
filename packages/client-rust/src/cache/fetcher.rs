use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ApiError;

/// Produces the value for a cache slot.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<T, ApiError>>`,
/// so most callers pass a closure through [`shared`].
#[async_trait]
pub trait Fetcher<T>: Send + Sync + 'static {
    async fn fetch(&self) -> Result<T, ApiError>;
}

#[async_trait]
impl<T, F, Fut> Fetcher<T> for F
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    async fn fetch(&self) -> Result<T, ApiError> {
        (self)().await
    }
}

/// Type-erased fetcher remembered on a slot for later refetches.
pub type SharedFetcher<T> = Arc<dyn Fetcher<T>>;

/// Erases a fetcher so it can be stored on a cache slot.
pub fn shared<T, F>(fetcher: F) -> SharedFetcher<T>
where
    F: Fetcher<T>,
{
    Arc::new(fetcher)
}
