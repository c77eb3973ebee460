//! Integration tests for the print workflow
//!
//! Drives `BrowserPdfPrinter` against the mock browser: host fallback,
//! base URL handling, cookie forwarding and session release on every path.

use std::sync::Arc;

use browser_pdf_printer::browser::{Cookie, MockBrowserManager};
use browser_pdf_printer::printer::{BrowserPdfPrinter, PrintError, PrintRequest};
use futures::StreamExt;
use url::Url;

// ============================================================================
// Test Helpers
// ============================================================================

const RENDER_HOST: &str = "render-host";

fn printer(manager: &MockBrowserManager) -> BrowserPdfPrinter {
    BrowserPdfPrinter::new(Arc::new(manager.clone()), RENDER_HOST)
}

fn request(address: &str) -> PrintRequest {
    PrintRequest::parse(address).unwrap()
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// Lets spawned release tasks run.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Host Resolution
// ============================================================================

#[tokio::test]
async fn test_unreachable_original_falls_back_to_render_host() {
    let manager = MockBrowserManager::new().with_reachable_host(RENDER_HOST);
    let printer = printer(&manager);

    let artifact = printer
        .print(&request("http://wiki.example/A/preview"))
        .await
        .unwrap();

    let strict: Vec<_> = manager
        .navigations()
        .into_iter()
        .filter(|navigation| navigation.strict)
        .collect();
    assert_eq!(strict.len(), 1);
    assert_eq!(strict[0].url, url("http://render-host/A/preview"));

    let tab = &manager.tabs()[0];
    assert_eq!(tab.base_url(), Some(url("http://wiki.example/A/preview")));
    assert_eq!(manager.total_closes(), 0);

    let pdf = artifact.read_to_end().await.unwrap();
    assert_eq!(pdf, manager.pdf().to_vec());
    assert_eq!(manager.total_closes(), 1);
}

#[tokio::test]
async fn test_reachable_original_is_used_as_is() {
    let manager = MockBrowserManager::new()
        .with_reachable_host("wiki.example")
        .with_reachable_host(RENDER_HOST);
    let printer = printer(&manager);

    let artifact = printer
        .print(&request("http://wiki.example/B/preview"))
        .await
        .unwrap();

    let navigations = manager.navigations();
    assert_eq!(navigations.len(), 2);
    assert_eq!(navigations[0].url, url("http://wiki.example/rest"));
    assert!(!navigations[0].strict);
    assert_eq!(navigations[1].url, url("http://wiki.example/B/preview"));
    assert!(navigations[1].strict);
    assert!(navigations.iter().all(|n| n.url.host_str() != Some(RENDER_HOST)));

    assert_eq!(manager.tabs()[0].base_url(), None);

    artifact.read_to_end().await.unwrap();
    assert_eq!(manager.total_closes(), 1);
}

#[tokio::test]
async fn test_probe_honours_context_path() {
    let manager = MockBrowserManager::new().with_reachable_host(RENDER_HOST);
    let printer = printer(&manager);

    let artifact = printer
        .print(
            &request("http://localhost:8080/xwiki/bin/export/Main/WebHome?format=pdf")
                .with_context_path("/xwiki"),
        )
        .await
        .unwrap();

    let urls: Vec<String> = manager
        .navigations()
        .into_iter()
        .map(|n| n.url.to_string())
        .collect();
    assert_eq!(
        urls,
        vec![
            "http://localhost:8080/xwiki/rest",
            "http://render-host:8080/xwiki/rest",
            "http://render-host:8080/xwiki/bin/export/Main/WebHome?format=pdf",
        ]
    );

    drop(artifact);
}

#[tokio::test]
async fn test_nothing_reachable_is_unreachable_error() {
    let manager = MockBrowserManager::new();
    let printer = printer(&manager);

    let err = printer
        .print(&request("http://wiki.example/A/preview"))
        .await
        .unwrap_err();

    assert!(matches!(err, PrintError::Unreachable { .. }));
    assert!(err.to_string().contains("http://wiki.example/A/preview"));
    assert!(manager.navigations().iter().all(|n| !n.strict));
    assert_eq!(manager.total_closes(), 1);
}

#[tokio::test]
async fn test_malformed_render_host_is_configuration_error() {
    let manager = MockBrowserManager::new().with_reachable_host("wiki.example");
    let printer = BrowserPdfPrinter::new(Arc::new(manager.clone()), "bad host");

    let err = printer
        .print(&request("http://wiki.example/A/preview"))
        .await
        .unwrap_err();

    assert!(matches!(err, PrintError::Configuration { .. }));
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(manager.tabs().len(), 1);
    assert_eq!(manager.total_closes(), 1);
}

// ============================================================================
// Missing Input
// ============================================================================

#[tokio::test]
async fn test_missing_address_creates_no_session() {
    let manager = MockBrowserManager::new().with_reachable_host("wiki.example");
    let printer = printer(&manager);

    for request in [PrintRequest::default(), request(""), request("   ")] {
        let err = printer.print(&request).await.unwrap_err();
        assert!(matches!(err, PrintError::MissingInput));
    }

    assert!(manager.tabs().is_empty());
    assert!(manager.navigations().is_empty());
}

#[tokio::test]
async fn test_hostless_address_is_invalid_address() {
    let manager = MockBrowserManager::new().with_reachable_host(RENDER_HOST);
    let printer = printer(&manager);

    for address in ["mailto:admin@wiki.example", "data:text/html,<p>x</p>"] {
        let err = printer
            .print(&PrintRequest::new(url(address)))
            .await
            .unwrap_err();
        assert!(matches!(err, PrintError::InvalidAddress { .. }), "{address}");
    }

    assert!(manager.tabs().is_empty());
    assert!(manager.navigations().is_empty());
}

// ============================================================================
// Navigation and Rendering Failures
// ============================================================================

#[tokio::test]
async fn test_failed_load_is_navigation_error() {
    let manager = MockBrowserManager::new()
        .with_reachable_host("wiki.example")
        .failing_navigation();
    let printer = printer(&manager);

    let err = printer
        .print(&request("http://wiki.example/A/preview"))
        .await
        .unwrap_err();

    match err {
        PrintError::Navigation { url: failed } => {
            assert_eq!(failed, url("http://wiki.example/A/preview"))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(manager.total_closes(), 1);
}

#[tokio::test]
async fn test_failed_render_is_render_error() {
    let manager = MockBrowserManager::new()
        .with_reachable_host("wiki.example")
        .failing_render("Printing failed");
    let printer = printer(&manager);

    let err = printer
        .print(&request("http://wiki.example/A/preview"))
        .await
        .unwrap_err();

    assert!(matches!(err, PrintError::Render(_)));
    assert!(err.to_string().contains("Printing failed"));
    assert_eq!(manager.total_closes(), 1);
}

#[tokio::test]
async fn test_failing_chunk_ends_stream_with_error() {
    let manager = MockBrowserManager::new()
        .with_reachable_host("wiki.example")
        .with_pdf(&b"%PDF-1.7 0123456789"[..], 4)
        .failing_stream_after(2);
    let printer = printer(&manager);

    let mut artifact = printer
        .print(&request("http://wiki.example/A/preview"))
        .await
        .unwrap();

    let mut results = Vec::new();
    while let Some(chunk) = artifact.next().await {
        results.push(chunk);
    }

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok() && results[1].is_ok());
    assert!(matches!(results[2], Err(PrintError::Render(_))));
    assert_eq!(artifact.bytes_read(), 8);
    assert_eq!(manager.total_closes(), 1);
}

#[tokio::test]
async fn test_navigation_transport_error_passes_through() {
    let manager = MockBrowserManager::new()
        .with_reachable_host("wiki.example")
        .with_navigation_error("connection reset");
    let printer = printer(&manager);

    let err = printer
        .print(&request("http://wiki.example/A/preview"))
        .await
        .unwrap_err();

    assert!(matches!(err, PrintError::Browser(_)));
    assert_eq!(err.to_string(), "connection reset");
    assert_eq!(manager.total_closes(), 1);
}

#[tokio::test]
async fn test_base_url_failure_passes_through() {
    let manager = MockBrowserManager::new()
        .with_reachable_host(RENDER_HOST)
        .failing_base_url("script evaluation failed");
    let printer = printer(&manager);

    let err = printer
        .print(&request("http://wiki.example/A/preview"))
        .await
        .unwrap_err();

    assert!(matches!(err, PrintError::Browser(_)));
    assert_eq!(err.to_string(), "script evaluation failed");
    assert_eq!(manager.tabs()[0].base_url(), None);
    assert_eq!(manager.total_closes(), 1);
}

#[tokio::test]
async fn test_tab_refusal_passes_through() {
    let manager = MockBrowserManager::new().refusing_tabs();
    let printer = printer(&manager);

    let err = printer
        .print(&request("http://wiki.example/A/preview"))
        .await
        .unwrap_err();

    assert!(matches!(err, PrintError::Browser(_)));
    assert!(manager.tabs().is_empty());
}

// ============================================================================
// Cookies
// ============================================================================

#[tokio::test]
async fn test_cookies_only_sent_with_print_preview_load() {
    let manager = MockBrowserManager::new().with_reachable_host(RENDER_HOST);
    let printer = printer(&manager);
    let cookies = Cookie::parse_header("JSESSIONID=abc123; remember=\"x=y\"");

    let artifact = printer
        .print(&request("http://wiki.example/A/preview").with_cookies(cookies.clone()))
        .await
        .unwrap();

    for navigation in manager.navigations() {
        if navigation.strict {
            assert_eq!(navigation.cookies, cookies);
        } else {
            assert!(navigation.cookies.is_empty());
        }
    }
    assert_eq!(cookies[1].value, "\"x=y\"");

    drop(artifact);
}

// ============================================================================
// Session Release
// ============================================================================

#[tokio::test]
async fn test_close_artifact_releases_once() {
    let manager = MockBrowserManager::new().with_reachable_host("wiki.example");
    let printer = printer(&manager);

    let mut artifact = printer
        .print(&request("http://wiki.example/A/preview"))
        .await
        .unwrap();

    assert!(!manager.tabs()[0].is_closed());
    artifact.close().await;
    assert_eq!(manager.total_closes(), 1);

    artifact.close().await;
    drop(artifact);
    settle().await;
    assert_eq!(manager.total_closes(), 1);
}

#[tokio::test]
async fn test_dropped_artifact_releases_once() {
    let manager = MockBrowserManager::new().with_reachable_host("wiki.example");
    let printer = printer(&manager);

    let mut artifact = printer
        .print(&request("http://wiki.example/A/preview"))
        .await
        .unwrap();
    let _ = artifact.next().await;

    drop(artifact);
    settle().await;

    assert_eq!(manager.total_closes(), 1);
}

#[tokio::test]
async fn test_every_outcome_closes_exactly_once() {
    let scenarios: Vec<(MockBrowserManager, &str)> = vec![
        (MockBrowserManager::new().with_reachable_host("wiki.example"), "ok"),
        (MockBrowserManager::new().with_reachable_host(RENDER_HOST), "fallback"),
        (MockBrowserManager::new(), "unreachable"),
        (
            MockBrowserManager::new()
                .with_reachable_host("wiki.example")
                .failing_navigation(),
            "navigation",
        ),
        (
            MockBrowserManager::new()
                .with_reachable_host("wiki.example")
                .failing_render("boom"),
            "render",
        ),
        (
            MockBrowserManager::new()
                .with_reachable_host("wiki.example")
                .with_navigation_error("connection reset"),
            "navigation transport",
        ),
        (
            MockBrowserManager::new()
                .with_reachable_host(RENDER_HOST)
                .failing_base_url("script evaluation failed"),
            "base url",
        ),
        (
            MockBrowserManager::new()
                .with_reachable_host("wiki.example")
                .failing_stream_after(1),
            "stream",
        ),
    ];

    for (manager, name) in scenarios {
        let printer = printer(&manager);
        if let Ok(artifact) = printer.print(&request("http://wiki.example/A/preview")).await {
            let _ = artifact.read_to_end().await;
        }
        settle().await;

        assert_eq!(manager.tabs().len(), 1, "{name}");
        assert_eq!(manager.total_closes(), 1, "{name}");
    }
}

#[tokio::test]
async fn test_concurrent_requests_use_separate_sessions() {
    let manager = MockBrowserManager::new().with_reachable_host("wiki.example");
    let printer = printer(&manager);

    let first = request("http://wiki.example/A/preview");
    let second = request("http://wiki.example/B/preview");
    let (a, b) = tokio::join!(printer.print(&first), printer.print(&second));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.session_id(), b.session_id());
    assert_eq!(manager.tabs().len(), 2);

    a.read_to_end().await.unwrap();
    b.read_to_end().await.unwrap();
    assert!(manager.tabs().iter().all(|tab| tab.close_count() == 1));
}

// ============================================================================
// Availability
// ============================================================================

#[tokio::test]
async fn test_is_available_never_fails() {
    assert!(printer(&MockBrowserManager::new()).is_available().await);
    assert!(!printer(&MockBrowserManager::new().disconnected()).is_available().await);
    assert!(
        !printer(&MockBrowserManager::new().with_connection_error("connection refused"))
            .is_available()
            .await
    );
}
