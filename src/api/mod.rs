//! REST API module for the PDF printer
//!
//! This module exposes the printer over HTTP: PDF printing, a browser
//! availability check and a health check.

pub mod routes;
pub mod server;

pub use routes::{create_router, ApiResponse};
pub use server::{ApiServer, AppState};
