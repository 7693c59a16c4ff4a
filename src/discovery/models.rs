//! Data models for discovery runs and discovered endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage of a discovery run, in the order they occur
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStep {
    Starting,
    Probing,
    Parsing,
    Extracting,
    Saving,
    Complete,
}

impl DiscoveryStep {
    pub fn as_str(&self) -> &str {
        match self {
            DiscoveryStep::Starting => "starting",
            DiscoveryStep::Probing => "probing",
            DiscoveryStep::Parsing => "parsing",
            DiscoveryStep::Extracting => "extracting",
            DiscoveryStep::Saving => "saving",
            DiscoveryStep::Complete => "complete",
        }
    }
}

/// Progress event pushed to the observer during a run. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryProgress {
    pub step: DiscoveryStep,
    pub message: String,
    /// 0-100, non-decreasing within a run
    pub progress: u8,
    pub endpoints_found: usize,
}

impl DiscoveryProgress {
    pub fn new(step: DiscoveryStep, message: impl Into<String>, progress: u8, endpoints_found: usize) -> Self {
        DiscoveryProgress {
            step,
            message: message.into(),
            progress,
            endpoints_found,
        }
    }
}

/// An endpoint extracted from a spec document, not yet persisted
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDraft {
    /// URL path (e.g., "/api/users/{id}")
    pub path: String,
    /// HTTP method, uppercase
    pub method: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Serialized JSON, kept opaque
    pub parameters: Option<String>,
    /// Serialized `requestBody`, kept opaque
    pub request_schema: Option<String>,
    /// Serialized `responses`, kept opaque
    pub response_schema: Option<String>,
    pub tags: Vec<String>,
    pub auth_required: bool,
    pub deprecated: bool,
    /// URL of the document the endpoint came from
    pub source: String,
}

impl EndpointDraft {
    pub fn new(method: impl Into<String>, path: impl Into<String>, source: impl Into<String>) -> Self {
        EndpointDraft {
            path: path.into(),
            method: method.into().to_uppercase(),
            summary: None,
            description: None,
            parameters: None,
            request_schema: None,
            response_schema: None,
            tags: Vec::new(),
            auth_required: false,
            deprecated: false,
            source: source.into(),
        }
    }
}

/// A persisted endpoint, owned by a workspace
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredEndpoint {
    pub id: String,
    pub workspace_id: String,
    #[serde(flatten)]
    pub endpoint: EndpointDraft,
    pub discovered_at: DateTime<Utc>,
}

/// Outcome of a completed discovery run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    /// Endpoints actually persisted by this run
    pub endpoints: Vec<DiscoveredEndpoint>,
    pub spec_url: Option<String>,
    pub spec_version: Option<String>,
    pub title: Option<String>,
}

impl DiscoveryResult {
    /// The result of a run that found no spec document
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order_and_wire_names() {
        assert!(DiscoveryStep::Starting < DiscoveryStep::Probing);
        assert!(DiscoveryStep::Saving < DiscoveryStep::Complete);
        assert_eq!(serde_json::to_string(&DiscoveryStep::Extracting).unwrap(), r#""extracting""#);
    }

    #[test]
    fn test_progress_serializes_camel_case() {
        let progress = DiscoveryProgress::new(DiscoveryStep::Saving, "saving", 80, 3);
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["endpointsFound"], 3);
        assert_eq!(json["step"], "saving");
    }

    #[test]
    fn test_empty_result_has_null_spec_fields() {
        let json = serde_json::to_value(DiscoveryResult::empty()).unwrap();
        assert_eq!(json["endpoints"], serde_json::json!([]));
        assert!(json["specUrl"].is_null());
        assert!(json["specVersion"].is_null());
        assert!(json["title"].is_null());
    }

    #[test]
    fn test_step_label_matches_wire_name() {
        for step in [DiscoveryStep::Starting, DiscoveryStep::Probing, DiscoveryStep::Complete] {
            assert_eq!(serde_json::to_value(step).unwrap(), step.as_str());
        }
    }

    #[test]
    fn test_draft_normalizes_method() {
        let draft = EndpointDraft::new("patch", "/pets/{id}", "http://x/openapi.json");
        assert_eq!(draft.method, "PATCH");
    }
}
