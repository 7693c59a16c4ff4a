//! Persistence of discovered endpoints and request history
//!
//! `Storage` is the seam the discovery engine and the CLI write through.
//! `MemoryStore` keeps everything in process; `FileStore` keeps one JSON
//! file per workspace and replaces it atomically on every batch.

pub mod file;
pub mod memory;

use chrono::Utc;
use uuid::Uuid;

use crate::discovery::{DiscoveredEndpoint, EndpointDraft};
use crate::models::{HistoryEntry, NewHistoryEntry};

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to (de)serialize stored data: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to (de)serialize environment: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Ids end up in file names, so only `[A-Za-z0-9_-]` is accepted
    #[error("invalid identifier: {0:?}")]
    InvalidId(String),
}

/// Storage collaborator for the engine.
///
/// Every batch operation is all-or-nothing.
pub trait Storage: Send + Sync {
    /// Append `drafts` to the workspace, assigning ids and timestamps
    fn save_discovered_endpoints(
        &self,
        workspace_id: &str,
        drafts: Vec<EndpointDraft>,
    ) -> Result<Vec<DiscoveredEndpoint>, StoreError>;

    /// Drop the workspace's endpoints and store `drafts` in their place
    fn replace_discovered_endpoints(
        &self,
        workspace_id: &str,
        drafts: Vec<EndpointDraft>,
    ) -> Result<Vec<DiscoveredEndpoint>, StoreError>;

    /// Endpoints of a workspace ordered by path, then method
    fn list_discovered_endpoints(&self, workspace_id: &str) -> Result<Vec<DiscoveredEndpoint>, StoreError>;

    fn clear_discovered_endpoints(&self, workspace_id: &str) -> Result<(), StoreError>;

    /// Persist one history row, assigning its id and execution time
    fn save_history_entry(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, StoreError>;

    /// Newest first, at most `limit` rows
    fn list_history(&self, workspace_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, StoreError>;
}

pub(crate) fn validate_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Turn drafts into rows; all rows of one batch share a timestamp
pub(crate) fn materialize(workspace_id: &str, drafts: Vec<EndpointDraft>) -> Vec<DiscoveredEndpoint> {
    let discovered_at = Utc::now();
    drafts
        .into_iter()
        .map(|endpoint| DiscoveredEndpoint {
            id: new_id(),
            workspace_id: workspace_id.to_string(),
            endpoint,
            discovered_at,
        })
        .collect()
}

pub(crate) fn stamp_history(entry: NewHistoryEntry) -> HistoryEntry {
    HistoryEntry {
        id: new_id(),
        entry,
        executed_at: Utc::now(),
    }
}

pub(crate) fn sort_endpoints(endpoints: &mut [DiscoveredEndpoint]) {
    endpoints.sort_by(|a, b| {
        a.endpoint
            .path
            .cmp(&b.endpoint.path)
            .then_with(|| a.endpoint.method.cmp(&b.endpoint.method))
    });
}
