use std::sync::Arc;

use nano_store::{LocalObjectStore, ObjectStore};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// nanocloud HTTP server.
pub struct NanoServer {
    config: ServerConfig,
    store: Arc<dyn ObjectStore>,
}

impl NanoServer {
    /// Validate `config` and open a local store at its storage root.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let store = LocalObjectStore::new(&config.storage_root)?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Serve an already constructed store.
    pub fn with_store(config: ServerConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> ServerResult<axum::Router> {
        build_router(Arc::clone(&self.store), &self.config)
    }

    /// Serve requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router()?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            root = %self.config.storage_root.display(),
            "nanocloud server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!("nanocloud server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
