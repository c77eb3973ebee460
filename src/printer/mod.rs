//! Server-side PDF printing through a remote browser.
//!
//! [`BrowserPdfPrinter`] turns a print preview address into a PDF stream:
//!
//! 1. open an isolated render session (incognito tab),
//! 2. find an address of the print preview the browser can reach,
//! 3. load it with the caller's cookies,
//! 4. keep relative links pointing at the caller's address,
//! 5. print, handing the session over to the returned [`PdfArtifact`].
//!
//! The session is closed exactly once: by the artifact when it is read,
//! closed or dropped, or by the printer itself as soon as a step fails.
//!
//! # Submodules
//!
//! - [`candidates`] - Alternative addresses and reachability probing
//! - [`artifact`] - The PDF stream bound to the session

pub mod artifact;
pub mod candidates;

use crate::browser::cookie::Cookie;
use crate::browser::engine::{BrowserManager, PdfStream};
use crate::browser::tab::{ReleaseReason, RenderSession};
use crate::config::PrinterSettings;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

pub use artifact::PdfArtifact;
pub use candidates::{candidate_urls, is_reachable, probe_url, resolve_browser_url, PROBE_ENDPOINT};

/// Errors returned by [`BrowserPdfPrinter::print`].
#[derive(Debug, Error)]
pub enum PrintError {
    /// No print preview address was given.
    #[error("Print preview URL missing.")]
    MissingInput,

    /// The address has no host the browser could be pointed at.
    #[error("Print preview URL has no host: {address}")]
    InvalidAddress { address: Url },

    /// None of the candidate addresses could be loaded by the browser.
    #[error(
        "Couldn't find an alternative print preview URL for {address} that the rendering \
         browser can access from within its network."
    )]
    Unreachable { address: Url },

    /// The configured render host cannot replace the host of the address.
    #[error("Invalid render host {host:?}: {source}")]
    Configuration {
        host: String,
        #[source]
        source: url::ParseError,
    },

    /// The browser reported an error while loading the print preview.
    #[error("Failed to load the print preview URL: {url}")]
    Navigation { url: Url },

    /// Printing to PDF, or reading the result, failed.
    #[error("Failed to print the print preview to PDF: {0:#}")]
    Render(anyhow::Error),

    /// Any other failure of the remote browser, passed through as is.
    #[error(transparent)]
    Browser(#[from] anyhow::Error),
}

/// One print request.
///
/// ```rust
/// use browser_pdf_printer::browser::Cookie;
/// use browser_pdf_printer::printer::PrintRequest;
///
/// let request = PrintRequest::parse("http://wiki.example/xwiki/bin/export/Main/WebHome")
///     .unwrap()
///     .with_cookies(vec![Cookie::new("JSESSIONID", "abc")])
///     .with_context_path("/xwiki");
/// assert_eq!(request.cookies().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PrintRequest {
    address: Option<Url>,
    cookies: Vec<Cookie>,
    context_path: String,
}

impl PrintRequest {
    pub fn new(address: Url) -> Self {
        Self {
            address: Some(address),
            ..Default::default()
        }
    }

    /// Builds a request from a raw address; a blank address gives a
    /// request without address.
    ///
    /// Addresses without a host (`mailto:`, `data:`, ...) are rejected with
    /// [`url::ParseError::EmptyHost`].
    pub fn parse(address: &str) -> Result<Self, url::ParseError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(Self::default());
        }
        let address = Url::parse(address)?;
        if address.host().is_none() {
            return Err(url::ParseError::EmptyHost);
        }
        Ok(Self::new(address))
    }

    pub fn with_cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Sets the path prefix of the web application, e.g. `/xwiki`.
    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Self {
        self.context_path = context_path.into();
        self
    }

    pub fn address(&self) -> Option<&Url> {
        self.address.as_ref()
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }
}

/// Prints web pages to PDF using a remote browser.
///
/// Cheap to clone; clones share the browser manager.
#[derive(Clone)]
pub struct BrowserPdfPrinter {
    manager: Arc<dyn BrowserManager>,
    render_host: String,
}

impl BrowserPdfPrinter {
    /// Creates a printer using `manager` for sessions and `render_host` as
    /// the alternative host of print preview addresses.
    pub fn new(manager: Arc<dyn BrowserManager>, render_host: impl Into<String>) -> Self {
        Self {
            manager,
            render_host: render_host.into(),
        }
    }

    pub fn from_settings(manager: Arc<dyn BrowserManager>, settings: &PrinterSettings) -> Self {
        Self::new(manager, settings.render_host.clone())
    }

    pub fn render_host(&self) -> &str {
        &self.render_host
    }

    /// Prints the print preview of `request` to PDF.
    pub async fn print(&self, request: &PrintRequest) -> Result<PdfArtifact, PrintError> {
        let address = request.address().ok_or(PrintError::MissingInput)?;
        if address.host().is_none() {
            return Err(PrintError::InvalidAddress {
                address: address.clone(),
            });
        }
        debug!("Printing [{}]", address);

        let mut session = RenderSession::acquire(self.manager.as_ref()).await?;
        match self.render(&mut session, address, request).await {
            Ok(stream) => {
                info!(session = %session.id(), "PDF ready for [{}]", address);
                Ok(PdfArtifact::new(session, stream))
            }
            Err(e) => {
                session.close(ReleaseReason::Failed).await;
                Err(e)
            }
        }
    }

    async fn render(
        &self,
        session: &mut RenderSession,
        address: &Url,
        request: &PrintRequest,
    ) -> Result<PdfStream, PrintError> {
        let browser_url =
            resolve_browser_url(address, &self.render_host, request.context_path(), session)
                .await?;

        if !session.navigate(&browser_url, request.cookies(), true).await? {
            return Err(PrintError::Navigation { url: browser_url });
        }

        if browser_url.as_str() != address.as_str() {
            // Links in the PDF must work for the caller, who may not be able
            // to reach the host used by the browser.
            session.set_base_url(address).await?;
        }

        session.print_to_pdf().await.map_err(PrintError::Render)
    }

    /// Checks whether the browser used for printing can be reached.
    pub async fn is_available(&self) -> bool {
        match self.manager.is_connected().await {
            Ok(connected) => connected,
            Err(e) => {
                warn!(
                    "Failed to connect to the web browser used for server-side PDF printing: {:#}",
                    e
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for BrowserPdfPrinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserPdfPrinter")
            .field("render_host", &self.render_host)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::engine::MockBrowserManager;

    #[test]
    fn test_parse_blank_request_has_no_address() {
        assert!(PrintRequest::parse("  ").unwrap().address().is_none());
        assert!(PrintRequest::parse("not a url").is_err());
    }

    #[test]
    fn test_parse_rejects_address_without_host() {
        for address in ["mailto:admin@wiki.example", "data:text/html,<p>x</p>"] {
            assert_eq!(
                PrintRequest::parse(address).unwrap_err(),
                url::ParseError::EmptyHost,
                "{address}"
            );
        }
    }

    #[tokio::test]
    async fn test_address_without_host_creates_no_session() {
        let manager = MockBrowserManager::new().with_reachable_host("render-host");
        let printer = BrowserPdfPrinter::new(Arc::new(manager.clone()), "render-host");
        let request = PrintRequest::new(Url::parse("mailto:admin@wiki.example").unwrap());

        let err = printer.print(&request).await.unwrap_err();

        assert!(matches!(err, PrintError::InvalidAddress { .. }));
        assert!(err.to_string().contains("mailto:admin@wiki.example"));
        assert!(manager.tabs().is_empty());
    }

    #[test]
    fn test_from_settings_uses_render_host() {
        let settings = PrinterSettings::default().with_render_host("render-host");
        let printer =
            BrowserPdfPrinter::from_settings(Arc::new(MockBrowserManager::new()), &settings);

        assert_eq!(printer.render_host(), "render-host");
    }

    #[test]
    fn test_error_messages() {
        let url = Url::parse("http://wiki.example/A/preview").unwrap();

        assert_eq!(PrintError::MissingInput.to_string(), "Print preview URL missing.");
        assert!(PrintError::Navigation { url: url.clone() }
            .to_string()
            .ends_with("http://wiki.example/A/preview"));
        assert!(PrintError::Unreachable { address: url }
            .to_string()
            .contains("rendering browser"));
    }

    #[tokio::test]
    async fn test_transport_error_passes_through_unchanged() {
        let manager = Arc::new(MockBrowserManager::new().refusing_tabs());
        let printer = BrowserPdfPrinter::new(manager, "render-host");
        let request = PrintRequest::parse("http://wiki.example/A").unwrap();

        let err = printer.print(&request).await.unwrap_err();

        assert!(matches!(err, PrintError::Browser(_)));
        assert_eq!(err.to_string(), "Browser refused to create a new tab");
    }
}
