//! Spec document probing over well-known URLs

use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::constants::{PROBE_ACCEPT, SPEC_PATHS};
use crate::discovery::DiscoveryError;

/// The first plausible spec document found on a host
#[derive(Clone, Debug, PartialEq)]
pub struct SpecDocument {
    pub url: String,
    pub content: String,
}

/// Why a candidate URL was passed over
#[derive(Debug)]
enum ProbeMiss {
    Transport(reqwest::Error),
    Timeout,
    Status(u16),
    NotASpec,
}

impl fmt::Display for ProbeMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMiss::Transport(e) => write!(f, "transport error: {}", e),
            ProbeMiss::Timeout => f.write_str("timed out"),
            ProbeMiss::Status(status) => write!(f, "status {}", status),
            ProbeMiss::NotASpec => f.write_str("body does not look like a spec"),
        }
    }
}

/// Candidate URLs for `base_url`, with one trailing slash stripped
pub fn candidate_urls(base_url: &str) -> Vec<String> {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    SPEC_PATHS.iter().map(|path| format!("{}{}", base, path)).collect()
}

/// A 200 response whose body is long enough and mentions openapi/swagger
pub fn looks_like_spec(status: u16, body: &str) -> bool {
    status == 200
        && body.chars().count() > 50
        && ["\"openapi\"", "\"swagger\"", "openapi:", "swagger:"]
            .iter()
            .any(|marker| body.contains(marker))
}

/// Try each candidate in order and return the first plausible document.
///
/// Misses are logged and skipped. `Ok(None)` means every candidate missed;
/// the only error is cancellation.
pub async fn probe_for_spec(
    client: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Option<SpecDocument>, DiscoveryError> {
    for url in candidate_urls(base_url) {
        let attempt = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
            attempt = fetch_candidate(client, &url, timeout) => attempt,
        };

        match attempt {
            Ok(content) => {
                tracing::info!(url = %url, "Found API specification");
                return Ok(Some(SpecDocument { url, content }));
            }
            Err(miss) => tracing::debug!(url = %url, reason = %miss, "Probe missed"),
        }
    }

    Ok(None)
}

async fn fetch_candidate(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<String, ProbeMiss> {
    let response = tokio::time::timeout(
        timeout,
        client.get(url).header(reqwest::header::ACCEPT, PROBE_ACCEPT).send(),
    )
    .await
    .map_err(|_| ProbeMiss::Timeout)?
    .map_err(ProbeMiss::Transport)?;

    let status = response.status().as_u16();
    if status != 200 {
        return Err(ProbeMiss::Status(status));
    }

    let body = tokio::time::timeout(timeout, response.text())
        .await
        .map_err(|_| ProbeMiss::Timeout)?
        .map_err(ProbeMiss::Transport)?;

    if looks_like_spec(status, &body) {
        Ok(body)
    } else {
        Err(ProbeMiss::NotASpec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_strip_one_trailing_slash() {
        let urls = candidate_urls("http://api.test/");
        assert_eq!(urls.len(), 10);
        assert_eq!(urls[0], "http://api.test/openapi.json");
        assert_eq!(urls[7], "http://api.test/v2/api-docs");
        assert_eq!(urls[9], "http://api.test/.well-known/openapi.json");

        assert_eq!(candidate_urls("http://api.test//")[0], "http://api.test//openapi.json");
    }

    #[test]
    fn test_plausibility() {
        let json = format!(r#"{{"openapi": "3.0.0", "info": {{"title": "{}"}}}}"#, "x".repeat(40));
        let yaml = format!("swagger: '2.0'\ninfo:\n  title: {}\n", "y".repeat(40));

        assert!(looks_like_spec(200, &json));
        assert!(looks_like_spec(200, &yaml));
        assert!(!looks_like_spec(201, &json));
        assert!(!looks_like_spec(200, r#"{"openapi": "3.0.0"}"#));
        assert!(!looks_like_spec(200, &"<html>not a spec</html>".repeat(5)));
    }
}
