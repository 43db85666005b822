//! Tower middleware layers for the transport pipeline.
//!
//! - [`timeout`]: Per-request timeout enforcement
//! - [`logging`]: Request timing and outcome via `tracing` spans
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod logging;
pub mod pipeline;
pub mod timeout;

pub use logging::RequestLogLayer;
pub use pipeline::build_transport_pipeline;
pub use timeout::TimeoutLayer;
