//! Browser engine abstraction layer.
//!
//! This module provides the capability traits the printer needs from a
//! remote browser: creating isolated tabs, navigating them with cookies,
//! overriding the base URL, printing to PDF and closing. A CDP
//! implementation lives in [`crate::browser::chromium_engine`] and an
//! in-memory double, [`MockBrowserManager`], is provided for tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use browser_pdf_printer::browser::{BrowserManager, MockBrowserManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = MockBrowserManager::new().with_reachable_host("wiki.example");
//!     let tab = manager.create_incognito_tab().await?;
//!     println!("Created tab: {}", tab.id());
//!     tab.close().await?;
//!     Ok(())
//! }
//! ```

use crate::browser::cookie::Cookie;
use crate::config::PrinterSettings;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Lazily produced PDF bytes, read from the remote browser chunk by chunk.
pub type PdfStream = BoxStream<'static, Result<Bytes>>;

/// Connection options for a remote browser.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// HTTP address of the remote debugging endpoint (e.g. "http://127.0.0.1:9222").
    pub endpoint: String,

    /// Timeout for each remote operation in milliseconds.
    pub timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9222".to_string(),
            timeout_ms: 60_000,
        }
    }
}

impl BrowserConfig {
    /// Creates a new BrowserConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the remote debugging endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets operation timeout in milliseconds.
    pub fn timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout_ms = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl From<&PrinterSettings> for BrowserConfig {
    fn from(settings: &PrinterSettings) -> Self {
        Self {
            endpoint: settings.browser_endpoint(),
            timeout_ms: settings.default_timeout_ms,
        }
    }
}

/// Entry point to a remote browser.
///
/// Implementations must tolerate concurrent calls: every print request
/// creates its own tab.
#[async_trait]
pub trait BrowserManager: Send + Sync {
    /// Creates a new tab in its own browsing context, so that cookies and
    /// storage never leak between requests.
    async fn create_incognito_tab(&self) -> Result<Arc<dyn BrowserTab>>;

    /// Checks whether the remote browser endpoint answers.
    async fn is_connected(&self) -> Result<bool>;
}

/// A tab living in an isolated browsing context of the remote browser.
#[async_trait]
pub trait BrowserTab: Send + Sync {
    /// Identifier of the tab, stable for its whole life.
    fn id(&self) -> &str;

    /// Loads `url` with `cookies` attached to the request context.
    ///
    /// Returns `Ok(false)` when the browser reports a load error. With
    /// `strict` set the call also waits for the page to finish loading and
    /// treats any error while doing so as a failure.
    async fn navigate(&self, url: &Url, cookies: &[Cookie], strict: bool) -> Result<bool>;

    /// Makes relative links of the loaded page resolve against `url`.
    /// Does not navigate.
    async fn set_base_url(&self, url: &Url) -> Result<()>;

    /// Prints the loaded page and returns the PDF as a stream.
    async fn print_to_pdf(&self) -> Result<PdfStream>;

    /// Closes the tab and its browsing context. Closing twice is a no-op.
    async fn close(&self) -> Result<()>;
}

/// A navigation observed by [`MockBrowserManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockNavigation {
    pub tab_id: String,
    pub url: Url,
    pub cookies: Vec<Cookie>,
    pub strict: bool,
}

#[derive(Debug)]
struct MockState {
    connected: bool,
    connection_error: Option<String>,
    refuse_tabs: bool,
    reachable_hosts: HashSet<String>,
    failing_navigation: bool,
    navigation_error: Option<String>,
    base_url_error: Option<String>,
    render_error: Option<String>,
    stream_error_after: Option<usize>,
    pdf: Bytes,
    chunk_size: usize,
    navigations: Vec<MockNavigation>,
}

/// Mock browser manager for testing purposes.
///
/// A navigation succeeds when the host of the target URL was registered
/// with [`MockBrowserManager::with_reachable_host`]. Every tab and every
/// navigation is recorded so tests can assert on them afterwards.
#[derive(Clone)]
pub struct MockBrowserManager {
    state: Arc<Mutex<MockState>>,
    tabs: Arc<Mutex<Vec<Arc<MockTab>>>>,
}

impl Default for MockBrowserManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBrowserManager {
    /// Creates a connected mock browser that cannot reach any host yet.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                connected: true,
                connection_error: None,
                refuse_tabs: false,
                reachable_hosts: HashSet::new(),
                failing_navigation: false,
                navigation_error: None,
                base_url_error: None,
                render_error: None,
                stream_error_after: None,
                pdf: Bytes::from_static(b"%PDF-1.7\n%mock\n%%EOF\n"),
                chunk_size: 8,
                navigations: Vec::new(),
            })),
            tabs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_reachable_host(self, host: &str) -> Self {
        self.state.lock().reachable_hosts.insert(host.to_string());
        self
    }

    /// Reports the endpoint as down without failing.
    pub fn disconnected(self) -> Self {
        self.state.lock().connected = false;
        self
    }

    /// Makes the connectivity check fail with a transport error.
    pub fn with_connection_error(self, message: &str) -> Self {
        self.state.lock().connection_error = Some(message.to_string());
        self
    }

    /// Refuses to create new tabs.
    pub fn refusing_tabs(self) -> Self {
        self.state.lock().refuse_tabs = true;
        self
    }

    /// Makes every strict navigation report a load error.
    pub fn failing_navigation(self) -> Self {
        self.state.lock().failing_navigation = true;
        self
    }

    /// Makes every strict navigation fail with a transport error.
    pub fn with_navigation_error(self, message: &str) -> Self {
        self.state.lock().navigation_error = Some(message.to_string());
        self
    }

    pub fn failing_base_url(self, message: &str) -> Self {
        self.state.lock().base_url_error = Some(message.to_string());
        self
    }

    pub fn failing_render(self, message: &str) -> Self {
        self.state.lock().render_error = Some(message.to_string());
        self
    }

    /// Makes the PDF stream fail after `chunks` chunks were produced.
    pub fn failing_stream_after(self, chunks: usize) -> Self {
        self.state.lock().stream_error_after = Some(chunks);
        self
    }

    pub fn with_pdf(self, pdf: impl Into<Bytes>, chunk_size: usize) -> Self {
        {
            let mut state = self.state.lock();
            state.pdf = pdf.into();
            state.chunk_size = chunk_size.max(1);
        }
        self
    }

    /// Returns every tab created so far.
    pub fn tabs(&self) -> Vec<Arc<MockTab>> {
        self.tabs.lock().clone()
    }

    /// Returns every navigation issued so far, in order.
    pub fn navigations(&self) -> Vec<MockNavigation> {
        self.state.lock().navigations.clone()
    }

    /// Sums the close calls received by all tabs.
    pub fn total_closes(&self) -> usize {
        self.tabs.lock().iter().map(|tab| tab.close_count()).sum()
    }

    /// Returns the PDF bytes every tab prints.
    pub fn pdf(&self) -> Bytes {
        self.state.lock().pdf.clone()
    }
}

#[async_trait]
impl BrowserManager for MockBrowserManager {
    async fn create_incognito_tab(&self) -> Result<Arc<dyn BrowserTab>> {
        if self.state.lock().refuse_tabs {
            return Err(anyhow!("Browser refused to create a new tab"));
        }

        let tab = Arc::new(MockTab {
            id: Uuid::new_v4().to_string(),
            state: self.state.clone(),
            base_url: Mutex::new(None),
            closes: AtomicUsize::new(0),
        });
        self.tabs.lock().push(tab.clone());

        Ok(tab)
    }

    async fn is_connected(&self) -> Result<bool> {
        let state = self.state.lock();
        if let Some(ref message) = state.connection_error {
            return Err(anyhow!("{}", message));
        }
        Ok(state.connected)
    }
}

/// Tab handed out by [`MockBrowserManager`].
#[derive(Debug)]
pub struct MockTab {
    id: String,
    state: Arc<Mutex<MockState>>,
    base_url: Mutex<Option<Url>>,
    closes: AtomicUsize,
}

impl MockTab {
    /// Number of times `close` was called on this tab.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }

    /// Base URL override last applied, if any.
    pub fn base_url(&self) -> Option<Url> {
        self.base_url.lock().clone()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(anyhow!("Tab is closed: {}", self.id));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserTab for MockTab {
    fn id(&self) -> &str {
        &self.id
    }

    async fn navigate(&self, url: &Url, cookies: &[Cookie], strict: bool) -> Result<bool> {
        self.ensure_open()?;

        let mut state = self.state.lock();
        state.navigations.push(MockNavigation {
            tab_id: self.id.clone(),
            url: url.clone(),
            cookies: cookies.to_vec(),
            strict,
        });

        if strict {
            if let Some(ref message) = state.navigation_error {
                return Err(anyhow!("{}", message));
            }
        }

        let reachable = url
            .host_str()
            .map(|host| state.reachable_hosts.contains(host))
            .unwrap_or(false);

        Ok(reachable && !(strict && state.failing_navigation))
    }

    async fn set_base_url(&self, url: &Url) -> Result<()> {
        self.ensure_open()?;
        if let Some(ref message) = self.state.lock().base_url_error {
            return Err(anyhow!("{}", message));
        }
        *self.base_url.lock() = Some(url.clone());
        Ok(())
    }

    async fn print_to_pdf(&self) -> Result<PdfStream> {
        self.ensure_open()?;

        let state = self.state.lock();
        if let Some(ref message) = state.render_error {
            return Err(anyhow!("{}", message));
        }

        let mut chunks: Vec<Result<Bytes>> = state
            .pdf
            .chunks(state.chunk_size)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        if let Some(after) = state.stream_error_after {
            chunks.truncate(after);
            chunks.push(Err(anyhow!("PDF stream interrupted")));
        }

        Ok(stream::iter(chunks).boxed())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_config_builder() {
        let config = BrowserConfig::new()
            .endpoint("http://chrome:9222")
            .timeout_ms(5_000);

        assert_eq!(config.endpoint, "http://chrome:9222");
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_browser_config_from_settings() {
        let settings = PrinterSettings::default()
            .with_browser_endpoint("chrome", 9333)
            .with_timeout(2_000);

        let config = BrowserConfig::from(&settings);

        assert_eq!(config.endpoint, "http://chrome:9333");
        assert_eq!(config.timeout_ms, 2_000);
    }

    #[tokio::test]
    async fn test_mock_tabs_are_distinct() {
        let manager = MockBrowserManager::new();

        let first = manager.create_incognito_tab().await.unwrap();
        let second = manager.create_incognito_tab().await.unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(manager.tabs().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_navigation_follows_reachable_hosts() {
        let manager = MockBrowserManager::new().with_reachable_host("render-host");
        let tab = manager.create_incognito_tab().await.unwrap();

        let reachable = Url::parse("http://render-host/rest").unwrap();
        let unreachable = Url::parse("http://wiki.example/rest").unwrap();

        assert!(tab.navigate(&reachable, &[], false).await.unwrap());
        assert!(!tab.navigate(&unreachable, &[], false).await.unwrap());
        assert_eq!(manager.navigations().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_closed_tab_rejects_operations() {
        let manager = MockBrowserManager::new().with_reachable_host("wiki.example");
        let tab = manager.create_incognito_tab().await.unwrap();
        let url = Url::parse("http://wiki.example/").unwrap();

        tab.close().await.unwrap();
        tab.close().await.unwrap();

        assert!(tab.navigate(&url, &[], true).await.is_err());
        assert!(tab.print_to_pdf().await.is_err());
        assert_eq!(manager.total_closes(), 2);
    }

    #[tokio::test]
    async fn test_mock_pdf_is_chunked() {
        let manager = MockBrowserManager::new().with_pdf(&b"0123456789"[..], 4);
        let tab = manager.create_incognito_tab().await.unwrap();

        let chunks: Vec<Bytes> = tab
            .print_to_pdf()
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), b"0123456789".to_vec());
    }

    #[tokio::test]
    async fn test_mock_connection_states() {
        assert!(MockBrowserManager::new().is_connected().await.unwrap());
        assert!(!MockBrowserManager::new()
            .disconnected()
            .is_connected()
            .await
            .unwrap());
        assert!(MockBrowserManager::new()
            .with_connection_error("connection refused")
            .is_connected()
            .await
            .is_err());
    }
}
