//! In-process storage backend

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::constants::MAX_HISTORY;
use crate::discovery::{DiscoveredEndpoint, EndpointDraft};
use crate::models::{HistoryEntry, NewHistoryEntry};
use crate::storage::{materialize, sort_endpoints, stamp_history, Storage, StoreError};

/// Keeps endpoints and history in memory for the life of the process
pub struct MemoryStore {
    endpoints: Mutex<HashMap<String, Vec<DiscoveredEndpoint>>>,
    history: Mutex<HashMap<String, VecDeque<HistoryEntry>>>,
    max_history: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            endpoints: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
            max_history: MAX_HISTORY,
        }
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    fn endpoints(&self) -> MutexGuard<'_, HashMap<String, Vec<DiscoveredEndpoint>>> {
        self.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn history(&self) -> MutexGuard<'_, HashMap<String, VecDeque<HistoryEntry>>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStore {
    fn save_discovered_endpoints(
        &self,
        workspace_id: &str,
        drafts: Vec<EndpointDraft>,
    ) -> Result<Vec<DiscoveredEndpoint>, StoreError> {
        let saved = materialize(workspace_id, drafts);
        self.endpoints()
            .entry(workspace_id.to_string())
            .or_default()
            .extend(saved.iter().cloned());
        Ok(saved)
    }

    fn replace_discovered_endpoints(
        &self,
        workspace_id: &str,
        drafts: Vec<EndpointDraft>,
    ) -> Result<Vec<DiscoveredEndpoint>, StoreError> {
        let saved = materialize(workspace_id, drafts);
        self.endpoints().insert(workspace_id.to_string(), saved.clone());
        Ok(saved)
    }

    fn list_discovered_endpoints(&self, workspace_id: &str) -> Result<Vec<DiscoveredEndpoint>, StoreError> {
        let mut endpoints = self.endpoints().get(workspace_id).cloned().unwrap_or_default();
        sort_endpoints(&mut endpoints);
        Ok(endpoints)
    }

    fn clear_discovered_endpoints(&self, workspace_id: &str) -> Result<(), StoreError> {
        self.endpoints().remove(workspace_id);
        Ok(())
    }

    fn save_history_entry(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, StoreError> {
        let saved = stamp_history(entry);
        let mut history = self.history();
        let rows = history.entry(saved.entry.workspace_id.clone()).or_default();
        rows.push_front(saved.clone());
        rows.truncate(self.max_history);
        Ok(saved)
    }

    fn list_history(&self, workspace_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self
            .history()
            .get(workspace_id)
            .map(|rows| rows.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HttpMethod, HttpRequestSpec, HttpResponseResult};

    fn drafts(specs: &[(&str, &str)]) -> Vec<EndpointDraft> {
        specs.iter().map(|(m, p)| EndpointDraft::new(*m, *p, "test")).collect()
    }

    #[test]
    fn test_save_appends_and_list_sorts() {
        let store = MemoryStore::new();
        store.save_discovered_endpoints("ws", drafts(&[("POST", "/users"), ("GET", "/users")])).unwrap();
        store.save_discovered_endpoints("ws", drafts(&[("GET", "/accounts")])).unwrap();

        let listed = store.list_discovered_endpoints("ws").unwrap();
        let keys: Vec<_> = listed.iter().map(|e| (e.endpoint.path.as_str(), e.endpoint.method.as_str())).collect();
        assert_eq!(keys, [("/accounts", "GET"), ("/users", "GET"), ("/users", "POST")]);
        assert!(store.list_discovered_endpoints("other").unwrap().is_empty());
    }

    #[test]
    fn test_replace_and_clear() {
        let store = MemoryStore::new();
        store.save_discovered_endpoints("ws", drafts(&[("GET", "/old")])).unwrap();
        store.replace_discovered_endpoints("ws", drafts(&[("GET", "/new")])).unwrap();

        let listed = store.list_discovered_endpoints("ws").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].endpoint.path, "/new");

        store.clear_discovered_endpoints("ws").unwrap();
        assert!(store.list_discovered_endpoints("ws").unwrap().is_empty());
    }

    #[test]
    fn test_history_newest_first_and_capped() {
        let store = MemoryStore::new().with_max_history(2);
        for i in 0..3 {
            let request = HttpRequestSpec::new(HttpMethod::GET, format!("http://x/{}", i));
            let outcome: Result<HttpResponseResult, String> = Err("boom".into());
            store.save_history_entry(NewHistoryEntry::from_outcome("ws", None, &request, &outcome)).unwrap();
        }

        let rows = store.list_history("ws", 10).unwrap();
        let urls: Vec<_> = rows.iter().map(|r| r.entry.url.as_str()).collect();
        assert_eq!(urls, ["http://x/2", "http://x/1"]);
        assert_eq!(store.list_history("ws", 1).unwrap().len(), 1);
    }
}
