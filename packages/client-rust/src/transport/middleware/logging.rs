//! Request logging middleware.
//!
//! Wraps each request in an `api_request` span and emits one event with the
//! status, duration, and outcome when it completes.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::error::ApiError;
use crate::transport::request::{ApiRequest, ApiResponse};

// ---------------------------------------------------------------------------
// RequestLogLayer
// ---------------------------------------------------------------------------

/// Tower layer that logs every API request with its duration and outcome.
#[derive(Debug, Clone)]
pub struct RequestLogLayer;

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService { inner }
    }
}

// ---------------------------------------------------------------------------
// RequestLogService
// ---------------------------------------------------------------------------

/// Service wrapper that records request duration and outcome in tracing spans.
#[derive(Debug, Clone)]
pub struct RequestLogService<S> {
    inner: S,
}

impl<S> Service<ApiRequest> for RequestLogService<S>
where
    S: Service<ApiRequest, Response = ApiResponse, Error = ApiError> + Send,
    S::Future: Send + 'static,
{
    type Response = ApiResponse;
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<ApiResponse, ApiError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ApiRequest) -> Self::Future {
        let method = req.method.to_string();
        let path = req.path.clone();
        let authenticated = req.bearer.is_some();

        let span = info_span!(
            "api_request",
            method = %method,
            path = %path,
            request_id = %req.request_id,
            authenticated,
            status = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::Span::current().record("duration_ms", duration_ms);

                match &result {
                    Ok(resp) => {
                        tracing::Span::current().record("status", resp.status);
                        let outcome = if resp.is_success() { "ok" } else { "error_status" };
                        tracing::info!(
                            method = %method,
                            path = %path,
                            status = resp.status,
                            duration_ms,
                            outcome,
                            "api request complete"
                        );
                    }
                    Err(e) => {
                        tracing::info!(
                            method = %method,
                            path = %path,
                            duration_ms,
                            outcome = "failed",
                            error = %e,
                            "api request complete"
                        );
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tower::ServiceExt;

    use super::*;

    /// Immediately-completing service echoing a fixed status.
    struct ImmediateService(u16);

    impl Service<ApiRequest> for ImmediateService {
        type Response = ApiResponse;
        type Error = ApiError;
        type Future = Pin<Box<dyn Future<Output = Result<ApiResponse, ApiError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: ApiRequest) -> Self::Future {
            let status = self.0;
            Box::pin(async move { Ok(ApiResponse { status, body: Bytes::new() }) })
        }
    }

    #[tokio::test]
    async fn log_layer_passes_through_response() {
        let svc = RequestLogLayer.layer(ImmediateService(201));
        let resp = svc.oneshot(ApiRequest::get("/playlists/me")).await.unwrap();
        assert_eq!(resp.status, 201);
    }
}
