//! Web server for pinboard.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use super::router::{create_health_router, create_router};
use crate::board::BoardContext;
use crate::config::ServerConfig;
use crate::{PinboardError, Result};

/// Web server for the board API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Shared board state.
    ctx: BoardContext,
    /// Header carrying the forwarded user ID.
    trusted_user_header: Option<String>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &ServerConfig, ctx: BoardContext) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| {
                PinboardError::Config(format!(
                    "invalid server address {}:{}: {}",
                    config.host, config.port, e
                ))
            })?;

        if config.trusted_user_header.is_none() {
            tracing::warn!(
                "server.trusted_user_header is not set; live board connections will be refused"
            );
        }

        Ok(Self {
            addr,
            ctx,
            trusted_user_header: config.trusted_user_header.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn router(&self) -> Router {
        create_router(self.ctx.clone(), self.trusted_user_header.as_deref())
            .merge(create_health_router())
    }

    /// Run the web server.
    pub async fn run(self) -> Result<()> {
        let router = self.router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(listener, router).await?;
        Ok(())
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let router = self.router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
