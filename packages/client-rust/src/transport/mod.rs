//! HTTP transport as a tower service stack.
//!
//! 1. **Request model** (`request`): `ApiRequest` -> `ApiResponse`
//! 2. **Middleware** (`middleware`): tower layers (request logging, timeout)
//! 3. **HTTP** (`http`): the innermost `reqwest`-backed service
//!
//! The API layer only sees a [`Transport`]: a boxed, cloneable
//! `Service<ApiRequest>`, so tests can swap the network for a stub.

pub mod http;
pub mod middleware;
pub mod request;

pub use self::http::HttpTransport;
pub use middleware::{build_transport_pipeline, RequestLogLayer, TimeoutLayer};
pub use request::{ApiRequest, ApiResponse};

use tower::util::BoxCloneService;

use crate::error::ApiError;

/// Type-erased transport stack used by [`ApiClient`](crate::api::ApiClient).
pub type Transport = BoxCloneService<ApiRequest, ApiResponse, ApiError>;
