//! Relay server listener
//!
//! Builds the HTTP router, owns the registry and drives shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::registry::Registry;
use crate::server::config::ServerConfig;
use crate::server::handlers::{self, RelayState};
use crate::stats::RelayStats;

/// Broadcast relay server
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<Registry>,
    stats: Arc<RelayStats>,
    shutdown: CancellationToken,
    state: RelayState,
}

impl RelayServer {
    /// Create a new server with the given configuration
    ///
    /// The registry is constructed here and lives as long as the server.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(Registry::with_config(config.registry.clone()));
        let stats = Arc::new(RelayStats::new());
        let shutdown = CancellationToken::new();

        let state = RelayState::new(
            Arc::clone(&registry),
            Arc::clone(&stats),
            shutdown.clone(),
            config.keepalive_interval,
            config.output_buffer,
            config.max_connections,
        );

        Self {
            config,
            registry,
            stats,
            shutdown,
            state,
        }
    }

    /// Get a reference to the participant registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get a reference to the relay statistics
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Token cancelled when the server shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Build the HTTP router
    ///
    /// Routes:
    /// - `GET /sse` - open a stream
    /// - `POST /send` - publish a message
    /// - `GET /stats` - relay counters
    pub fn router(&self) -> Router {
        Router::new()
            .route("/sse", get(handlers::open_stream))
            .route("/send", post(handlers::publish))
            .route("/stats", get(handlers::stats))
            .layer(CatchPanicLayer::new())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.config.validate()?;

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` completes
    ///
    /// On shutdown every open stream is cancelled, then in-flight requests
    /// are allowed to finish.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Relay server listening");

        let token = self.shutdown.clone();
        let signal = async move {
            tokio::select! {
                _ = shutdown => tracing::info!("Shutdown signal received"),
                _ = token.cancelled() => {}
            }
            token.cancel();
        };

        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!(
            participants = self.registry.len(),
            published = self.stats.snapshot().messages_published,
            "Relay server stopped"
        );

        Ok(())
    }

    /// Stop a running server
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_built_from_config() {
        let config = ServerConfig::default().registry(
            crate::registry::RegistryConfig::default().max_participants(3),
        );
        let server = RelayServer::new(config);

        assert_eq!(server.registry().config().max_participants, 3);
        assert!(server.registry().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_bind() {
        let config = ServerConfig::default().output_buffer(0);
        let server = RelayServer::new(config);

        let result = server.run_until(async {}).await;
        assert!(matches!(result, Err(crate::error::Error::Config(_))));
    }

    #[tokio::test]
    async fn test_shutdown_stops_serving() {
        let server = RelayServer::new(ServerConfig::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        server.shutdown();
        let result = server.serve(listener, std::future::pending()).await;

        assert!(result.is_ok());
        assert!(server.shutdown_token().is_cancelled());
    }
}
