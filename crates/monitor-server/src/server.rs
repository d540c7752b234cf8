//! Monitor server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use monitor_alerts::ShortcutTable;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::process::ProcessRunner;
use crate::routes::create_router;
use crate::state::MonitorState;

/// HTTP control surface of the monitor sidecar.
#[derive(Debug, Clone)]
pub struct MonitorServer {
    state: Arc<MonitorState>,
}

impl MonitorServer {
    /// Create a server with an empty store.
    #[must_use]
    pub fn new(config: ServerConfig, shortcuts: ShortcutTable, runner: Arc<dyn ProcessRunner>) -> Self {
        Self::from_state(MonitorState::new(config, shortcuts, runner))
    }

    /// Create a server around prepared state.
    #[must_use]
    pub fn from_state(state: MonitorState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Get the server state.
    #[must_use]
    pub fn state(&self) -> Arc<MonitorState> {
        self.state.clone()
    }

    /// Start the server and listen for connections.
    ///
    /// Runs until the server encounters a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve(&self, addr: SocketAddr) -> Result<()> {
        self.serve_with_shutdown(addr, std::future::pending()).await
    }

    /// Start the server with graceful shutdown support.
    ///
    /// The server shuts down when `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve_with_shutdown<F>(&self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting connections fails.
    pub async fn serve_on<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        info!(addr = %addr, "monitor listening");

        axum::serve(listener, create_router(self.state.clone()))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        info!("monitor shut down");
        Ok(())
    }

    /// Create the router without starting the server.
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }
}
