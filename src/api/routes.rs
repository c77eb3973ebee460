//! REST API routes and handlers
//!
//! Defines the HTTP endpoints of the printer.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::server::AppState;
use crate::browser::Cookie;
use crate::printer::{PrintError, PrintRequest};

// ============================================================================
// Request/Response Structs
// ============================================================================

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Browser availability response
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

/// Print query parameters
#[derive(Debug, Deserialize)]
pub struct PrintQuery {
    /// Address of the print preview, as seen by the caller
    #[serde(default)]
    pub url: Option<String>,
    /// Path prefix of the web application; defaults to the configured one
    #[serde(default)]
    pub context_path: Option<String>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// GET /available - Whether the rendering browser can be reached
pub async fn available(State(state): State<AppState>) -> impl IntoResponse {
    let available = state.printer.is_available().await;

    Json(ApiResponse::success(AvailabilityResponse { available }))
}

/// GET /print - Print a page to PDF
///
/// The caller's `Cookie` header is forwarded to the browser unchanged.
pub async fn print(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PrintQuery>,
) -> Response {
    let request = match PrintRequest::parse(query.url.as_deref().unwrap_or_default()) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error(format!("Invalid print preview URL: {}", e))),
            )
                .into_response();
        }
    };

    let context_path = query
        .context_path
        .unwrap_or_else(|| state.default_context_path().to_string());
    let request = request
        .with_cookies(request_cookies(&headers))
        .with_context_path(context_path);

    match state.printer.print(&request).await {
        Ok(artifact) => {
            info!(session = %artifact.session_id(), "Streaming PDF");
            (
                [
                    (header::CONTENT_TYPE, "application/pdf"),
                    (header::CACHE_CONTROL, "no-store"),
                ],
                Body::from_stream(artifact),
            )
                .into_response()
        }
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                error!("Failed to print PDF: {:#}", e);
            } else {
                warn!("Rejected print request: {}", e);
            }
            (status, Json(ApiResponse::<()>::error(e.to_string()))).into_response()
        }
    }
}

/// Maps a print failure to the HTTP status reported to the caller.
pub fn error_status(error: &PrintError) -> StatusCode {
    match error {
        PrintError::MissingInput | PrintError::InvalidAddress { .. } => StatusCode::BAD_REQUEST,
        PrintError::Unreachable { .. }
        | PrintError::Navigation { .. }
        | PrintError::Render(_) => StatusCode::BAD_GATEWAY,
        PrintError::Configuration { .. } | PrintError::Browser(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Collects the cookies of every `Cookie` header, in order.
fn request_cookies(headers: &HeaderMap) -> Vec<Cookie> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::parse_header)
        .collect()
}

// ============================================================================
// Router Configuration
// ============================================================================

/// Create the API router with all routes configured
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/available", get(available))
        .route("/print", get(print))
        .with_state(state)
}
