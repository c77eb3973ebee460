//! HTTP server implementation using axum
//!
//! Provides the main API server with CORS support, graceful shutdown,
//! and tracing middleware.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api::routes::create_router;
use crate::config::PrinterSettings;
use crate::printer::BrowserPdfPrinter;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Printer used by `/print` and `/available`
    pub printer: BrowserPdfPrinter,
    /// Settings the server was started with
    pub settings: Arc<PrinterSettings>,
}

impl AppState {
    pub fn new(printer: BrowserPdfPrinter, settings: PrinterSettings) -> Self {
        Self {
            printer,
            settings: Arc::new(settings),
        }
    }

    /// Context path used when a print request does not name one.
    pub fn default_context_path(&self) -> &str {
        &self.settings.context_path
    }
}

/// HTTP API server
pub struct ApiServer {
    /// Port to listen on
    port: u16,
    /// Whether the server is running
    running: bool,
    /// Shared application state
    state: AppState,
    /// Shutdown signal sender
    shutdown_tx: Option<watch::Sender<bool>>,
    /// Server task handle
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ApiServer {
    /// Create a new API server instance
    pub fn new(port: u16, state: AppState) -> Self {
        Self {
            port,
            running: false,
            state,
            shutdown_tx: None,
            server_handle: None,
        }
    }

    /// Get the server port
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Get a clone of the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    fn configure_cors() -> CorsLayer {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
            .max_age(Duration::from_secs(3600))
    }

    /// Build the router with all middleware
    fn build_router(&self) -> Router {
        create_router(self.state.clone())
            .layer(Self::configure_cors())
            .layer(TraceLayer::new_for_http())
    }

    /// Start the HTTP server
    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.running {
            warn!("API server is already running");
            return Ok(());
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = self.build_router();

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        let listener = TcpListener::bind(addr).await?;
        info!("API server listening on http://{}", addr);

        self.running = true;

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    while !*shutdown_rx.borrow() {
                        if shutdown_rx.changed().await.is_err() {
                            break;
                        }
                    }
                    info!("API server shutting down gracefully");
                })
                .await
                .unwrap_or_else(|e| {
                    error!("API server error: {}", e);
                });
        });

        self.server_handle = Some(handle);

        Ok(())
    }

    /// Stop the HTTP server gracefully
    pub async fn stop(&mut self) {
        if !self.running {
            warn!("API server is not running");
            return;
        }

        info!("Stopping API server...");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }

        // In-flight PDF downloads get a few seconds to finish.
        if let Some(handle) = self.server_handle.take() {
            tokio::select! {
                _ = handle => {
                    info!("API server stopped successfully");
                }
                _ = tokio::time::sleep(Duration::from_secs(5)) => {
                    warn!("API server shutdown timed out");
                }
            }
        }

        self.running = false;
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
    }
}
