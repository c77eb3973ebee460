//! Browser-reachable print preview addresses.
//!
//! The print preview address is built from the caller's request, so it
//! reflects how the caller reaches the web application. The rendering
//! browser may run in its own network namespace where that host means
//! something else (`localhost`) or nothing at all, so a few equivalent
//! addresses are tried from inside the browser before giving up.

use crate::browser::tab::RenderSession;
use crate::printer::PrintError;
use tracing::debug;
use url::Url;

/// Cheap, side-effect free endpoint used to test reachability.
pub const PROBE_ENDPOINT: &str = "/rest";

/// Returns the addresses to try, most likely first: the caller's address
/// unchanged, then the same address on `render_host`.
///
/// An address without a host gives [`PrintError::InvalidAddress`].
pub fn candidate_urls(address: &Url, render_host: &str) -> Result<Vec<Url>, PrintError> {
    if address.host().is_none() {
        return Err(PrintError::InvalidAddress {
            address: address.clone(),
        });
    }

    let mut candidates = vec![address.clone()];

    let mut alternative = address.clone();
    alternative
        .set_host(Some(render_host))
        .map_err(|source| PrintError::Configuration {
            host: render_host.to_string(),
            source,
        })?;
    if alternative != *address {
        candidates.push(alternative);
    }

    Ok(candidates)
}

/// Address of the probe endpoint for `candidate`.
pub fn probe_url(candidate: &Url, context_path: &str) -> Result<Url, url::ParseError> {
    candidate.join(&format!(
        "{}{}",
        context_path.trim_end_matches('/'),
        PROBE_ENDPOINT
    ))
}

/// Checks whether the browser behind `session` can load `candidate`.
///
/// Errors count as "not reachable" and are never propagated.
pub async fn is_reachable(candidate: &Url, session: &RenderSession, context_path: &str) -> bool {
    let probe = match probe_url(candidate, context_path) {
        Ok(probe) => probe,
        Err(e) => {
            debug!(candidate = %candidate, "Cannot build probe URL: {}", e);
            return false;
        }
    };

    match session.navigate(&probe, &[], false).await {
        Ok(reachable) => {
            debug!(session = %session.id(), probe = %probe, reachable, "Probed print preview host");
            reachable
        }
        Err(e) => {
            debug!(session = %session.id(), probe = %probe, "Probe failed: {:#}", e);
            false
        }
    }
}

/// Picks the first candidate address the browser can reach.
pub async fn resolve_browser_url(
    address: &Url,
    render_host: &str,
    context_path: &str,
    session: &RenderSession,
) -> Result<Url, PrintError> {
    for candidate in candidate_urls(address, render_host)? {
        if is_reachable(&candidate, session, context_path).await {
            return Ok(candidate);
        }
    }

    Err(PrintError::Unreachable {
        address: address.clone(),
    })
}
