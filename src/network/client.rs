//! HTTP client wrapper - executes requests and normalizes responses

use std::collections::HashMap;
use std::error::Error as _;
use std::fmt;
use std::time::{Duration, Instant};
use chrono::Utc;
use reqwest::header::HeaderMap;

use crate::cancel::{ActiveGuard, ActiveSlot};
use crate::constants::{APP_NAME, APP_VERSION, DEFAULT_TIMEOUT_MS, MAX_RESPONSE_SIZE, TRUNCATION_MARKER};
use crate::models::{HttpRequestSpec, HttpResponseResult, RequestTiming};
use crate::variables::{resolve_request, ResolvedRequest};

/// Which half of the exchange a timeout hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Headers,
    Body,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Headers => f.write_str("response headers"),
            Phase::Body => f.write_str("response body"),
        }
    }
}

/// Why an execution produced no response
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecuteError {
    /// Superseded by a newer execution or cancelled explicitly
    #[error("Request cancelled")]
    Cancelled,
    #[error("Request timed out after {timeout_ms}ms waiting for {phase}")]
    Timeout { phase: Phase, timeout_ms: u64 },
    /// DNS, connect, TLS or protocol failure, with the transport's message
    #[error("{0}")]
    Transport(String),
}

impl From<reqwest::Error> for ExecuteError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest's top-level message hides the cause ("error sending request")
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        ExecuteError::Transport(message)
    }
}

/// Executes one request at a time; a new call cancels the one in flight
pub struct RequestExecutor {
    client: reqwest::Client,
    default_timeout_ms: u64,
    active: ActiveSlot,
}

impl RequestExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        RequestExecutor {
            client,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            active: ActiveSlot::new(),
        }
    }

    /// Timeout used when a request does not carry its own
    pub fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    /// Execute `request`, cancelling any execution still in flight.
    ///
    /// A non-2xx status is a successful result. The superseded caller gets
    /// `ExecuteError::Cancelled`.
    pub async fn execute(&self, request: HttpRequestSpec) -> Result<HttpResponseResult, ExecuteError> {
        let guard = self.register();
        self.execute_registered(guard, request).await
    }

    /// Claim the execution slot now, cancelling whatever is in flight.
    ///
    /// Lets a dispatcher fix the order of executions before handing each
    /// one to its own task.
    pub fn register(&self) -> ActiveGuard {
        self.active.begin()
    }

    /// Drive an execution claimed with [`register`](Self::register)
    pub async fn execute_registered(
        &self,
        guard: ActiveGuard,
        request: HttpRequestSpec,
    ) -> Result<HttpResponseResult, ExecuteError> {
        tracing::info!(method = %request.method, url = %request.url, "Executing request");

        let result = tokio::select! {
            biased;

            _ = guard.token().cancelled() => Err(ExecuteError::Cancelled),
            result = self.dispatch(&request) => result,
        };

        match &result {
            Ok(response) => tracing::info!(
                status = response.status_code,
                size = response.size,
                truncated = response.is_truncated,
                time_ms = response.timing.total_time,
                "Request completed"
            ),
            Err(ExecuteError::Cancelled) => tracing::info!(url = %request.url, "Request cancelled"),
            Err(e) => tracing::warn!(url = %request.url, error = %e, "Request failed"),
        }

        result
    }

    /// Cancel the in-flight execution, if any
    pub fn cancel_active(&self) {
        if self.active.cancel() {
            tracing::info!("Cancelling active request");
        }
    }

    /// Whether an execution is currently in flight
    pub fn is_busy(&self) -> bool {
        self.active.is_active()
    }

    async fn dispatch(&self, request: &HttpRequestSpec) -> Result<HttpResponseResult, ExecuteError> {
        let resolved = match &request.variables {
            Some(variables) => resolve_request(request, variables),
            None => ResolvedRequest::verbatim(request),
        };
        let timeout_ms = request.timeout_ms.unwrap_or(self.default_timeout_ms);
        let timeout = Duration::from_millis(timeout_ms);

        let mut req_builder = self.client.request(request.method.to_reqwest(), resolved.url.as_str());
        for (name, value) in &resolved.headers {
            req_builder = req_builder.header(name.as_str(), value.as_str());
        }
        // No method/body validation: whatever the user wrote goes out
        if let Some(body) = resolved.body {
            req_builder = req_builder.body(body);
        }

        let start_time = Utc::now().timestamp_millis();
        let start = Instant::now();

        let response = tokio::time::timeout(timeout, req_builder.send())
            .await
            .map_err(|_| ExecuteError::Timeout { phase: Phase::Headers, timeout_ms })??;

        let status = response.status();
        let headers = collect_headers(response.headers());

        let bytes = tokio::time::timeout(timeout, response.bytes())
            .await
            .map_err(|_| ExecuteError::Timeout { phase: Phase::Body, timeout_ms })??;

        let total_time = (start.elapsed().as_secs_f64() * 1000.0).round() as u64;
        let (body, size, is_truncated) = bound_body(&bytes);

        Ok(HttpResponseResult {
            status_code: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
            size,
            is_truncated,
            timing: RequestTiming {
                start_time,
                total_time,
                ..RequestTiming::default()
            },
        })
    }
}

/// Flatten response headers, joining repeated names with ", "
fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut collected: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.clone().into_owned());
    }
    collected
}

/// Decode the body and cap it at `MAX_RESPONSE_SIZE` bytes.
///
/// Returns the text, the original byte length and the truncation flag.
pub(crate) fn bound_body(bytes: &[u8]) -> (String, usize, bool) {
    let size = bytes.len();
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if size <= MAX_RESPONSE_SIZE {
        return (text, size, false);
    }

    let mut cut = MAX_RESPONSE_SIZE.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str(TRUNCATION_MARKER);
    (text, size, true)
}

/// Create an HTTP client with default configuration.
///
/// No client-wide timeout is set; each call applies its own.
pub fn create_client(user_agent: Option<&str>) -> reqwest::Client {
    let default_agent = format!("{}/{}", APP_NAME, APP_VERSION);
    reqwest::Client::builder()
        .user_agent(user_agent.unwrap_or(default_agent.as_str()))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
