//! # Browser PDF Printer
//!
//! Server-side PDF printing of web pages through a remote Chrome/Chromium.
//!
//! A web application asks for the PDF of one of its own pages (the "print
//! preview"). The browser doing the rendering often runs in another network
//! namespace, a container for instance, where the host the caller used is
//! not reachable. The printer finds an equivalent address the browser can
//! load, forwards the caller's cookies so the page renders with the caller's
//! identity, and returns the PDF as a stream.
//!
//! ## Features
//!
//! - **Isolated sessions**: one incognito tab per request, always released
//! - **Host fallback**: retries the address on a configured render host
//! - **Streaming output**: PDF chunks are read lazily from the browser
//! - **REST API**: `/print`, `/available` and `/health` over HTTP
//! - **Flexible Configuration**: TOML/JSON files, environment variables, CLI arguments
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use browser_pdf_printer::{
//!     browser::{BrowserConfig, ChromiumBrowserManager},
//!     printer::{BrowserPdfPrinter, PrintRequest},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = ChromiumBrowserManager::connect(
//!         BrowserConfig::new().endpoint("http://127.0.0.1:9222"),
//!     )
//!     .await?;
//!     let printer = BrowserPdfPrinter::new(Arc::new(manager), "host.docker.internal");
//!
//!     let request = PrintRequest::parse("http://localhost:8080/xwiki/bin/export/Main/WebHome")?
//!         .with_context_path("/xwiki");
//!     let pdf = printer.print(&request).await?.read_to_end().await?;
//!     std::fs::write("WebHome.pdf", pdf)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`printer`]: Print workflow, host fallback and the PDF stream
//! - [`browser`]: Browser capability traits, render sessions, CDP implementation
//! - [`api`]: REST API server
//! - [`config`]: Configuration loading and management
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Browser PDF Printer                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐      ┌─────────────┐      ┌──────────────────┐     │
//! │  │   API   │ ───▶ │   Printer   │ ───▶ │  RenderSession   │     │
//! │  │ Server  │      │ (fallback)  │      │  (BrowserTab)    │     │
//! │  └────┬────┘      └──────┬──────┘      └────────┬─────────┘     │
//! │       │                  │                      │               │
//! │       └──────────────────┴──────────┬───────────┘               │
//! │                               ┌─────┴─────┐                     │
//! │                               │  Config   │                     │
//! │                               └───────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//!
//! Configuration follows a precedence chain:
//! 1. Default values
//! 2. Configuration file (TOML/JSON)
//! 3. Environment variables (`PDF_PRINTER_*`)
//! 4. CLI arguments
//!
//! See [`config::PrinterSettings`] for all available options.

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Full version string with name
pub const FULL_VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Module Exports
// ============================================================================

/// Browser capability traits, render sessions and the CDP implementation.
pub mod browser;

/// Print workflow turning a print preview address into a PDF stream.
pub mod printer;

/// REST API server exposing the printer over HTTP.
pub mod api;

/// Configuration management for loading settings from files, env, and CLI.
pub mod config;

// ============================================================================
// Re-exports for Convenience
// ============================================================================

// Browser types
pub use browser::{
    BrowserConfig, BrowserManager, BrowserTab, Cookie, MockBrowserManager, PdfStream,
    ReleaseReason, RenderSession, TabStatus,
};

// Chromiumoxide types (when feature enabled)
#[cfg(feature = "chromium-browser")]
pub use browser::ChromiumBrowserManager;

// Printer types
pub use printer::{BrowserPdfPrinter, PdfArtifact, PrintError, PrintRequest};

// API types
pub use api::{ApiServer, AppState};

// Config types
pub use config::{CliArgs, ConfigError, PrinterSettings};

// ============================================================================
// Prelude Module
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```rust
/// use browser_pdf_printer::prelude::*;
/// ```
pub mod prelude {
    pub use crate::api::{ApiServer, AppState};
    pub use crate::browser::{BrowserManager, Cookie, RenderSession};
    pub use crate::config::{CliArgs, PrinterSettings};
    pub use crate::printer::{BrowserPdfPrinter, PdfArtifact, PrintError, PrintRequest};
    pub use crate::{FULL_VERSION, NAME, VERSION};
}
