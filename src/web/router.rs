//! Router configuration for the web adapter.

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::middleware::trusted_principal;
use super::ws::board_ws_handler;
use crate::board::BoardContext;

/// Create the main API router.
///
/// When `trusted_user_header` is set, the principal is read from that
/// header on every request. Otherwise no principal is ever attached and
/// live connections are refused.
pub fn create_router(ctx: BoardContext, trusted_user_header: Option<&str>) -> Router {
    let board_routes = Router::new().route("/:board_id/ws", get(board_ws_handler));

    let api_routes = Router::new().nest("/boards", board_routes);

    let router = Router::new().nest("/api", api_routes).with_state(ctx);

    let router = match trusted_user_header {
        Some(header) => {
            let header: Arc<str> = Arc::from(header);
            router.layer(middleware::from_fn(move |req, next| {
                trusted_principal(header.clone(), req, next)
            }))
        }
        None => router,
    };

    router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
