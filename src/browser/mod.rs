//! Browser module providing the remote rendering capabilities.
//!
//! This module contains the abstractions over the browser used for printing,
//! the render session lifecycle and the cookies forwarded to it.
//!
//! # Submodules
//!
//! - [`engine`] - Browser capability traits, connection options and a mock implementation
//! - [`tab`] - Render session guard with exactly-once release
//! - [`cookie`] - Caller cookies forwarded to the browser
//! - [`chromium_engine`] - CDP implementation (requires `chromium-browser` feature)

pub mod cookie;
pub mod engine;
pub mod tab;

/// Chromiumoxide browser manager implementation (requires `chromium-browser` feature).
#[cfg(feature = "chromium-browser")]
pub mod chromium_engine;

// Re-export commonly used types for convenience
pub use cookie::Cookie;
pub use engine::{
    BrowserConfig, BrowserManager, BrowserTab, MockBrowserManager, MockNavigation, MockTab,
    PdfStream,
};
pub use tab::{ReleaseReason, RenderSession, TabStatus};

#[cfg(feature = "chromium-browser")]
pub use chromium_engine::ChromiumBrowserManager;
