//! Pipeline composition: combines all middleware layers into a single service stack.

use tower::ServiceBuilder;

use super::logging::RequestLogLayer;
use super::timeout::TimeoutLayer;
use crate::config::ClientConfig;
use crate::transport::http::HttpTransport;
use crate::transport::Transport;

/// Build the transport pipeline around an [`HttpTransport`].
///
/// Layer order (outermost to innermost):
/// 1. `RequestLogLayer` -- log every request, including ones that time out
/// 2. `TimeoutLayer` -- enforce `config.request_timeout`
#[must_use]
pub fn build_transport_pipeline(config: &ClientConfig) -> Transport {
    let http = HttpTransport::new(config.base_url.clone());
    Transport::new(
        ServiceBuilder::new()
            .layer(RequestLogLayer)
            .layer(TimeoutLayer::new(config.request_timeout))
            .service(http),
    )
}
