//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::bootstrap::BootstrappedServices;

pub mod http;
pub mod response;
pub mod ws;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("failed to bind to {0}: {1}")]
    Bind(SocketAddr, std::io::Error),
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds a reference to the bootstrapped
/// services. All business logic lives in the services themselves.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<BootstrappedServices>,
}

/// Builder for constructing an `AppState`.
#[derive(Default)]
pub struct AppStateBuilder {
    services: Option<Arc<BootstrappedServices>>,
}

impl AppStateBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bootstrapped services.
    pub fn services(mut self, services: Arc<BootstrappedServices>) -> Self {
        self.services = Some(services);
        self
    }

    /// Builds the `AppState`, panicking if `services` was not set.
    pub fn build(self) -> AppState {
        AppState {
            services: self.services.expect("services is required"),
        }
    }
}

impl AppState {
    /// Creates a new builder for constructing an `AppState`.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

/// Starts the HTTP server on `addr`, serving until the cancellation token in
/// `state.services` is triggered.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Bind(addr, e))?;

    log::info!("control API listening on http://{addr}");
    let app = http::create_router(state.clone());
    let cancel_token = state.services.cancel_token.clone();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
            log::info!("control API shutting down");
        })
        .await
        .map_err(|e| ServerError::Bind(addr, e))?;
    Ok(())
}
