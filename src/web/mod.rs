//! Web adapter for pinboard.
//!
//! Exposes a board's live feed over WebSocket and a health check. The
//! board operations themselves are reached through [`crate::board`]; this
//! adapter only admits connections and maps errors to HTTP statuses.

pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod ws;

pub use error::{ApiError, ErrorCode};
pub use router::{create_health_router, create_router};
pub use server::WebServer;
