//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request id, trace span, timeout)
//!     → /tyk/* control API, or
//!     → RegistrySnapshot::match_request → ApiPipeline::handle
//!     → response.rs (gateway-generated error bodies)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{client_origin, X_REQUEST_ID};
pub use server::{gateway_router, GatewayServer};
