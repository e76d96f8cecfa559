use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Pantry HTTP server.
pub struct PantryServer {
    config: ServerConfig,
}

impl PantryServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the configured store and build the router (useful for testing).
    pub async fn router(&self) -> ServerResult<axum::Router> {
        let store = self.config.store.open().await?;
        build_router(AppState::new(store, &self.config), &self.config)
    }

    /// Start serving requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router().await?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Pantry server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        info!("Pantry server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;

    #[test]
    fn server_construction() {
        let server = PantryServer::new(ServerConfig::default());
        assert_eq!(server.config().bind_addr, "127.0.0.1:8000".parse().unwrap());
    }

    #[tokio::test]
    async fn router_builds() {
        let mut config = ServerConfig::default();
        config.store.backend = StoreBackend::Memory;
        PantryServer::new(config).router().await.unwrap();
    }
}
