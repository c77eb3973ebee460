//! Render session lifecycle.
//!
//! A [`RenderSession`] owns exactly one isolated browser tab for the
//! duration of one print request and releases it exactly once, whichever
//! of the release paths fires first:
//!
//! - an explicit [`RenderSession::close`] on a failure path,
//! - the completion hook handed to the PDF artifact ([`RenderSession::release_hook`]),
//! - dropping the session while it is still open.
//!
//! # Example
//!
//! ```rust,ignore
//! use browser_pdf_printer::browser::{MockBrowserManager, ReleaseReason, RenderSession};
//!
//! let manager = MockBrowserManager::new();
//! let session = RenderSession::acquire(&manager).await?;
//! assert!(session.close(ReleaseReason::Closed).await);
//! assert!(!session.close(ReleaseReason::Closed).await);
//! ```

use crate::browser::cookie::Cookie;
use crate::browser::engine::{BrowserManager, BrowserTab, PdfStream};
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use url::Url;

/// Lifecycle state of a render session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    /// The tab exists in the remote browser.
    Open,
    /// The tab has been released.
    Closed,
}

impl std::fmt::Display for TabStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TabStatus::Open => write!(f, "Open"),
            TabStatus::Closed => write!(f, "Closed"),
        }
    }
}

/// Why a render session was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// The PDF stream was read to the end.
    Drained,
    /// The consumer closed the PDF stream.
    Closed,
    /// The session or its stream was dropped while still open.
    Abandoned,
    /// A step of the print request failed.
    Failed,
}

impl std::fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleaseReason::Drained => write!(f, "drained"),
            ReleaseReason::Closed => write!(f, "closed"),
            ReleaseReason::Abandoned => write!(f, "abandoned"),
            ReleaseReason::Failed => write!(f, "failed"),
        }
    }
}

/// Owner of one isolated browser tab, used for exactly one print request.
///
/// Sessions are never cloned or shared between requests.
pub struct RenderSession {
    id: String,
    tab: Arc<dyn BrowserTab>,
    created_at: DateTime<Utc>,
    closed: Arc<AtomicBool>,
    base_url: Option<Url>,
    runtime: Option<Handle>,
}

impl RenderSession {
    /// Wraps an already created tab.
    pub fn new(tab: Arc<dyn BrowserTab>) -> Self {
        Self {
            id: tab.id().to_string(),
            tab,
            created_at: Utc::now(),
            closed: Arc::new(AtomicBool::new(false)),
            base_url: None,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Creates a fresh incognito tab and takes ownership of it.
    pub async fn acquire(manager: &dyn BrowserManager) -> Result<Self> {
        let tab = manager.create_incognito_tab().await?;
        let session = Self::new(tab);
        info!(session = %session.id, "Render session opened");
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> TabStatus {
        if self.closed.load(Ordering::SeqCst) {
            TabStatus::Closed
        } else {
            TabStatus::Open
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status() == TabStatus::Closed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the duration since the session was opened.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }

    /// Base URL override applied to the loaded page, if any.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub async fn navigate(&self, url: &Url, cookies: &[Cookie], strict: bool) -> Result<bool> {
        debug!(session = %self.id, url = %url, strict, "Navigating");
        self.tab.navigate(url, cookies, strict).await
    }

    pub async fn set_base_url(&mut self, url: &Url) -> Result<()> {
        self.tab.set_base_url(url).await?;
        self.base_url = Some(url.clone());
        Ok(())
    }

    pub async fn print_to_pdf(&self) -> Result<PdfStream> {
        debug!(session = %self.id, "Printing to PDF");
        self.tab.print_to_pdf().await
    }

    /// Releases the tab now.
    ///
    /// Returns `true` if this call performed the release, `false` if the
    /// session had already been released.
    pub async fn close(&self, reason: ReleaseReason) -> bool {
        self.release_hook(reason).await
    }

    /// Returns a detached future releasing the tab.
    ///
    /// The release only starts once the future is polled; all hooks of a
    /// session share the same open-to-closed transition.
    pub fn release_hook(&self, reason: ReleaseReason) -> BoxFuture<'static, bool> {
        let id = self.id.clone();
        let tab = self.tab.clone();
        let closed = self.closed.clone();
        let created_at = self.created_at;

        async move {
            if closed
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return false;
            }

            let lifetime_ms = (Utc::now() - created_at).num_milliseconds();
            match tab.close().await {
                Ok(()) => info!(session = %id, %reason, lifetime_ms, "Render session closed"),
                Err(e) => warn!(session = %id, %reason, "Failed to close render session: {:#}", e),
            }
            true
        }
        .boxed()
    }
}

impl std::fmt::Debug for RenderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSession")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("created_at", &self.created_at)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        self.spawn_release(self.release_hook(ReleaseReason::Abandoned));
    }
}

impl RenderSession {
    /// Runs a release future from synchronous code, such as a `Drop` impl.
    ///
    /// The future is spawned on the runtime the session was opened on, from
    /// whichever thread the drop happens. Sessions opened outside any tokio
    /// runtime are released inline.
    pub(crate) fn spawn_release(&self, release: BoxFuture<'static, bool>) {
        match self.runtime {
            Some(ref handle) => {
                handle.spawn(release);
            }
            None => {
                futures::executor::block_on(release);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::engine::MockBrowserManager;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let manager = MockBrowserManager::new();
        let session = RenderSession::acquire(&manager).await.unwrap();

        assert_eq!(session.status(), TabStatus::Open);
        assert!(session.close(ReleaseReason::Failed).await);
        assert!(!session.close(ReleaseReason::Failed).await);
        assert_eq!(session.status(), TabStatus::Closed);

        drop(session);
        settle().await;
        assert_eq!(manager.total_closes(), 1);
    }

    #[tokio::test]
    async fn test_unpolled_hook_does_not_release() {
        let manager = MockBrowserManager::new();
        let session = RenderSession::acquire(&manager).await.unwrap();

        let hook = session.release_hook(ReleaseReason::Drained);
        drop(hook);

        assert!(!session.is_closed());
        assert!(session.close(ReleaseReason::Closed).await);
        assert_eq!(manager.total_closes(), 1);
    }

    #[tokio::test]
    async fn test_hooks_share_one_transition() {
        let manager = MockBrowserManager::new();
        let session = RenderSession::acquire(&manager).await.unwrap();

        let first = session.release_hook(ReleaseReason::Drained);
        let second = session.release_hook(ReleaseReason::Closed);

        assert!(first.await);
        assert!(!second.await);
        assert_eq!(manager.total_closes(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_open_session() {
        let manager = MockBrowserManager::new();
        let session = RenderSession::acquire(&manager).await.unwrap();

        drop(session);
        settle().await;

        assert_eq!(manager.total_closes(), 1);
    }

    #[tokio::test]
    async fn test_acquire_propagates_refusal() {
        let manager = MockBrowserManager::new().refusing_tabs();

        assert!(RenderSession::acquire(&manager).await.is_err());
        assert!(manager.tabs().is_empty());
    }

    #[tokio::test]
    async fn test_drop_on_foreign_thread_releases_on_owning_runtime() {
        let manager = MockBrowserManager::new();
        let session = RenderSession::acquire(&manager).await.unwrap();

        std::thread::spawn(move || drop(session)).join().unwrap();

        for _ in 0..100 {
            if manager.total_closes() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        assert_eq!(manager.total_closes(), 1);
    }

    #[test]
    fn test_drop_outside_runtime_releases() {
        let manager = MockBrowserManager::new();
        let session = futures::executor::block_on(RenderSession::acquire(&manager)).unwrap();

        drop(session);

        assert_eq!(manager.total_closes(), 1);
    }
}
