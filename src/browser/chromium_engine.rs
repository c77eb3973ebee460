//! Chromiumoxide-based browser manager.
//!
//! Controls an already running Chrome/Chromium through the Chrome DevTools
//! Protocol (CDP). The browser process itself is managed elsewhere (often a
//! dedicated container); this module only connects to its remote debugging
//! endpoint.

use crate::browser::cookie::Cookie;
use crate::browser::engine::{BrowserConfig, BrowserManager, BrowserTab, PdfStream};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::io::{CloseParams, ReadParams, StreamHandle};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetCookiesParams};
use chromiumoxide::cdp::browser_protocol::page::{
    NavigateParams, PrintToPdfParams, PrintToPdfTransferMode,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Chromiumoxide-based browser manager.
pub struct ChromiumBrowserManager {
    config: BrowserConfig,
    browser: Arc<Browser>,
    http: reqwest::Client,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromiumBrowserManager {
    /// Connects to the remote debugging endpoint described by `config`.
    pub async fn connect(config: BrowserConfig) -> Result<Self> {
        info!("Connecting to browser at {}", config.endpoint);

        let (browser, mut handler) = bounded(
            config.timeout(),
            "Browser connection",
            Browser::connect(config.endpoint.clone()),
        )
        .await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
            warn!("Browser handler stream ended");
        });

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        info!("Connected to browser at {}", config.endpoint);

        Ok(Self {
            config,
            browser: Arc::new(browser),
            http,
            handler_task,
        })
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }
}

impl Drop for ChromiumBrowserManager {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

#[async_trait]
impl BrowserManager for ChromiumBrowserManager {
    async fn create_incognito_tab(&self) -> Result<Arc<dyn BrowserTab>> {
        let timeout = self.config.timeout();

        let context = bounded(
            timeout,
            "Target.createBrowserContext",
            self.browser.execute(CreateBrowserContextParams::default()),
        )
        .await?;
        let context_id = context.result.browser_context_id.clone();

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(anyhow::Error::msg)?;

        let page = match bounded(timeout, "Target.createTarget", self.browser.new_page(params)).await
        {
            Ok(page) => page,
            Err(e) => {
                dispose_context(&self.browser, context_id, timeout).await;
                return Err(e);
            }
        };

        let tab = ChromiumTab {
            id: Uuid::new_v4().to_string(),
            browser: self.browser.clone(),
            page,
            context_id,
            timeout,
            closed: AtomicBool::new(false),
        };
        debug!(tab = %tab.id, "Incognito tab created");

        Ok(Arc::new(tab))
    }

    async fn is_connected(&self) -> Result<bool> {
        if self.handler_task.is_finished() {
            return Ok(false);
        }

        let url = format!("{}/json/version", self.config.endpoint.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        Ok(response.status().is_success())
    }
}

/// Tab living in its own browser context.
struct ChromiumTab {
    id: String,
    browser: Arc<Browser>,
    page: Page,
    context_id: BrowserContextId,
    timeout: Duration,
    closed: AtomicBool,
}

#[async_trait]
impl BrowserTab for ChromiumTab {
    fn id(&self) -> &str {
        &self.id
    }

    async fn navigate(&self, url: &Url, cookies: &[Cookie], strict: bool) -> Result<bool> {
        if !cookies.is_empty() {
            let params = cookies
                .iter()
                .map(|cookie| cookie_param(cookie, url))
                .collect::<Result<Vec<_>>>()?;
            bounded(
                self.timeout,
                "Network.setCookies",
                self.page.execute(SetCookiesParams::new(params)),
            )
            .await?;
        }

        let response = bounded(
            self.timeout,
            "Page.navigate",
            self.page.execute(NavigateParams::new(url.as_str())),
        )
        .await?;

        if let Some(ref error) = response.result.error_text {
            debug!(tab = %self.id, url = %url, "Navigation failed: {}", error);
            return Ok(false);
        }

        if strict {
            bounded(self.timeout, "Page load", self.page.wait_for_navigation()).await?;
        }

        Ok(true)
    }

    async fn set_base_url(&self, url: &Url) -> Result<()> {
        let href = serde_json::to_string(url.as_str())?;
        let script = format!(
            "(() => {{ \
                let base = document.querySelector('base'); \
                if (!base) {{ \
                    base = document.createElement('base'); \
                    (document.head || document.documentElement).prepend(base); \
                }} \
                base.href = {}; \
            }})()",
            href
        );

        bounded(self.timeout, "Base URL override", self.page.evaluate(script)).await?;
        Ok(())
    }

    async fn print_to_pdf(&self) -> Result<PdfStream> {
        let params = PrintToPdfParams::builder()
            .print_background(true)
            .prefer_css_page_size(true)
            .transfer_mode(PrintToPdfTransferMode::ReturnAsStream)
            .build();

        let response = bounded(self.timeout, "Page.printToPDF", self.page.execute(params)).await?;
        let handle = response
            .result
            .stream
            .clone()
            .ok_or_else(|| anyhow!("Browser did not return a PDF stream handle"))?;

        Ok(read_pdf_stream(self.page.clone(), handle, self.timeout))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let closed_page = bounded(self.timeout, "Target.closeTarget", self.page.clone().close()).await;
        dispose_context(&self.browser, self.context_id.clone(), self.timeout).await;
        closed_page
    }
}

/// Reads a CDP IO stream lazily, one `IO.read` per chunk, and closes the
/// handle once the browser reports EOF.
fn read_pdf_stream(page: Page, handle: StreamHandle, timeout: Duration) -> PdfStream {
    stream::unfold(Some((page, handle)), move |state| async move {
        let (page, handle) = state?;

        let response = match bounded(timeout, "IO.read", page.execute(ReadParams::new(handle.clone()))).await {
            Ok(response) => response,
            Err(e) => return Some((Err(e), None)),
        };
        let chunk = &response.result;

        let data = if chunk.base64_encoded.unwrap_or(false) {
            match BASE64.decode(&chunk.data) {
                Ok(decoded) => Bytes::from(decoded),
                Err(e) => return Some((Err(anyhow!("Invalid PDF chunk encoding: {}", e)), None)),
            }
        } else {
            Bytes::from(chunk.data.clone().into_bytes())
        };

        if chunk.eof {
            if let Err(e) = bounded(timeout, "IO.close", page.execute(CloseParams::new(handle))).await {
                warn!("Failed to close PDF stream: {:#}", e);
            }
            Some((Ok(data), None))
        } else {
            Some((Ok(data), Some((page, handle))))
        }
    })
    .boxed()
}

fn cookie_param(cookie: &Cookie, url: &Url) -> Result<CookieParam> {
    // Bound to the navigated URL: the caller's domain is usually not the
    // host the rendering browser talks to.
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .url(url.as_str())
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if let Some(ref path) = cookie.path {
        builder = builder.path(path.clone());
    }

    builder
        .build()
        .map_err(|e| anyhow!("Invalid cookie {}: {}", cookie.name, e))
}

async fn dispose_context(browser: &Browser, context_id: BrowserContextId, timeout: Duration) {
    if let Err(e) = bounded(
        timeout,
        "Target.disposeBrowserContext",
        browser.execute(DisposeBrowserContextParams::new(context_id)),
    )
    .await
    {
        warn!("Failed to dispose browser context: {:#}", e);
    }
}

/// Applies the transport timeout to one remote operation.
async fn bounded<T, E>(
    timeout: Duration,
    operation: &str,
    future: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result.with_context(|| format!("{} failed", operation)),
        Err(_) => Err(anyhow!("{} timed out after {:?}", operation, timeout)),
    }
}
