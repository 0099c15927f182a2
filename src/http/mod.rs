//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, in-flight limit)
//!     → request.rs (correlation ID, hop-by-hop stripping)
//!     → gateway::Gateway::handle (match, pipeline, dispatch)
//!     → context.rs (per-request route, params, deadline)
//!     → response.rs (JSON error bodies)
//!     → Send to client
//! ```

pub mod context;
pub mod request;
pub mod response;
pub mod server;

pub use context::RequestContext;
pub use request::X_REQUEST_ID;
pub use server::GatewayServer;
