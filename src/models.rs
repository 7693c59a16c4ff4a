use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::variables;

/// HTTP Method enum
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::GET,
        HttpMethod::POST,
        HttpMethod::PUT,
        HttpMethod::PATCH,
        HttpMethod::DELETE,
        HttpMethod::HEAD,
        HttpMethod::OPTIONS,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::GET => reqwest::Method::GET,
            HttpMethod::POST => reqwest::Method::POST,
            HttpMethod::PUT => reqwest::Method::PUT,
            HttpMethod::PATCH => reqwest::Method::PATCH,
            HttpMethod::DELETE => reqwest::Method::DELETE,
            HttpMethod::HEAD => reqwest::Method::HEAD,
            HttpMethod::OPTIONS => reqwest::Method::OPTIONS,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a verb is outside the supported set
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unsupported HTTP method: {0}")]
pub struct ParseMethodError(pub String);

impl FromStr for HttpMethod {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseMethodError(s.to_string()))
    }
}

/// Authentication attached as a plain `Authorization` header
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum AuthType {
    #[default]
    None,
    Bearer(String),
    Basic {
        username: String,
        password: String,
    },
}

impl AuthType {
    /// Insert the `Authorization` header, replacing any existing one
    pub fn apply(&self, headers: &mut HashMap<String, String>) {
        let value = match self {
            AuthType::None => return,
            AuthType::Bearer(token) => format!("Bearer {}", token),
            AuthType::Basic { username, password } => {
                let credentials = format!("{}:{}", username, password);
                let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
                format!("Basic {}", encoded)
            }
        };
        headers.retain(|name, _| !name.eq_ignore_ascii_case("authorization"));
        headers.insert("Authorization".to_string(), value);
    }
}

/// A fully specified HTTP request, as authored by the user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestSpec {
    pub method: HttpMethod,
    /// May contain `{{variable}}` placeholders
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    /// Applies to header receipt and body receipt separately
    #[serde(default, rename = "timeout")]
    pub timeout_ms: Option<u64>,
    /// Substitution is skipped entirely when absent
    #[serde(default)]
    pub variables: Option<HashMap<String, String>>,
}

impl HttpRequestSpec {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        HttpRequestSpec {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout_ms: None,
            variables: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// Timing record of one execution.
///
/// Only `total_time` is measured; the phase breakdown stays at zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTiming {
    /// Milliseconds since the Unix epoch
    pub start_time: i64,
    pub dns_time: u64,
    pub connect_time: u64,
    pub tls_time: u64,
    pub first_byte_time: u64,
    pub total_time: u64,
}

/// Normalized, size-bounded response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseResult {
    pub status_code: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: String,
    /// Byte length of the body as received, before truncation
    pub size: usize,
    pub is_truncated: bool,
    pub timing: RequestTiming,
}

impl HttpResponseResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Environment variables
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub variables: HashMap<String, String>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Environment {
            name: name.into(),
            variables: HashMap::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Substitutes {{variable}} patterns in text
    pub fn substitute(&self, text: &str) -> String {
        variables::resolve(text, &self.variables)
    }
}

/// History row as handed to storage, before it gets an id and timestamp
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryEntry {
    pub request_id: Option<String>,
    pub workspace_id: String,
    pub method: String,
    pub url: String,
    pub request_headers: Option<String>,
    pub request_body: Option<String>,
    pub status_code: Option<u16>,
    pub response_headers: Option<String>,
    pub response_body: Option<String>,
    pub response_size_bytes: Option<usize>,
    pub response_time_ms: Option<u64>,
    pub error_message: Option<String>,
}

impl NewHistoryEntry {
    /// Build a history row from a request and whatever its execution produced
    pub fn from_outcome<E: fmt::Display>(
        workspace_id: impl Into<String>,
        request_id: Option<String>,
        request: &HttpRequestSpec,
        outcome: &Result<HttpResponseResult, E>,
    ) -> Self {
        let request_headers = if request.headers.is_empty() {
            None
        } else {
            serde_json::to_string(&request.headers).ok()
        };

        let mut entry = NewHistoryEntry {
            request_id,
            workspace_id: workspace_id.into(),
            method: request.method.as_str().to_string(),
            url: request.url.clone(),
            request_headers,
            request_body: request.body.clone(),
            status_code: None,
            response_headers: None,
            response_body: None,
            response_size_bytes: None,
            response_time_ms: None,
            error_message: None,
        };

        match outcome {
            Ok(response) => {
                entry.status_code = Some(response.status_code);
                entry.response_headers = serde_json::to_string(&response.headers).ok();
                entry.response_body = Some(response.body.clone());
                entry.response_size_bytes = Some(response.size);
                entry.response_time_ms = Some(response.timing.total_time);
            }
            Err(e) => entry.error_message = Some(e.to_string()),
        }

        entry
    }
}

/// Persisted history row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    #[serde(flatten)]
    pub entry: NewHistoryEntry,
    pub executed_at: DateTime<Utc>,
}
