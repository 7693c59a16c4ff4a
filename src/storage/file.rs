//! JSON-file storage backend
//!
//! Layout under the data directory:
//! - `discovery/<workspace>.json` - endpoints of one workspace
//! - `history/<workspace>.json` - history rows, newest first
//! - `environments/<name>.env.yaml` - named variable sets

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::constants::MAX_HISTORY;
use crate::discovery::{DiscoveredEndpoint, EndpointDraft};
use crate::models::{Environment, HistoryEntry, NewHistoryEntry};
use crate::storage::{materialize, sort_endpoints, stamp_history, validate_id, Storage, StoreError};

/// Stores each workspace in its own JSON file
pub struct FileStore {
    root: PathBuf,
    max_history: usize,
    // Serializes read-modify-write cycles within the process
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore {
            root: root.into(),
            max_history: MAX_HISTORY,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Load `<root>/environments/<name>.env.yaml`
    pub fn load_environment(&self, name: &str) -> Result<Environment, StoreError> {
        validate_id(name)?;
        let content = fs::read_to_string(self.environment_path(name))?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Save an environment under its own name
    pub fn save_environment(&self, environment: &Environment) -> Result<(), StoreError> {
        validate_id(&environment.name)?;
        let content = serde_yaml::to_string(environment)?;
        write_atomic(&self.environment_path(&environment.name), content.as_bytes())
    }

    fn environment_path(&self, name: &str) -> PathBuf {
        self.root.join("environments").join(format!("{}.env.yaml", name))
    }

    fn discovery_path(&self, workspace_id: &str) -> Result<PathBuf, StoreError> {
        validate_id(workspace_id)?;
        Ok(self.root.join("discovery").join(format!("{}.json", workspace_id)))
    }

    fn history_path(&self, workspace_id: &str) -> Result<PathBuf, StoreError> {
        validate_id(workspace_id)?;
        Ok(self.root.join("history").join(format!("{}.json", workspace_id)))
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist_endpoints(
        &self,
        workspace_id: &str,
        drafts: Vec<EndpointDraft>,
        replace: bool,
    ) -> Result<Vec<DiscoveredEndpoint>, StoreError> {
        let path = self.discovery_path(workspace_id)?;
        let _guard = self.lock();

        let mut rows: Vec<DiscoveredEndpoint> = if replace { Vec::new() } else { read_json(&path)? };
        let saved = materialize(workspace_id, drafts);
        rows.extend(saved.iter().cloned());
        write_json(&path, &rows)?;

        tracing::debug!(workspace_id, count = saved.len(), replace, "Persisted discovered endpoints");
        Ok(saved)
    }
}

impl Storage for FileStore {
    fn save_discovered_endpoints(
        &self,
        workspace_id: &str,
        drafts: Vec<EndpointDraft>,
    ) -> Result<Vec<DiscoveredEndpoint>, StoreError> {
        self.persist_endpoints(workspace_id, drafts, false)
    }

    fn replace_discovered_endpoints(
        &self,
        workspace_id: &str,
        drafts: Vec<EndpointDraft>,
    ) -> Result<Vec<DiscoveredEndpoint>, StoreError> {
        self.persist_endpoints(workspace_id, drafts, true)
    }

    fn list_discovered_endpoints(&self, workspace_id: &str) -> Result<Vec<DiscoveredEndpoint>, StoreError> {
        let mut endpoints: Vec<DiscoveredEndpoint> = read_json(&self.discovery_path(workspace_id)?)?;
        sort_endpoints(&mut endpoints);
        Ok(endpoints)
    }

    fn clear_discovered_endpoints(&self, workspace_id: &str) -> Result<(), StoreError> {
        let path = self.discovery_path(workspace_id)?;
        let _guard = self.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_history_entry(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, StoreError> {
        let path = self.history_path(&entry.workspace_id)?;
        let _guard = self.lock();

        let mut rows: Vec<HistoryEntry> = read_json(&path)?;
        let saved = stamp_history(entry);
        rows.insert(0, saved.clone());
        rows.truncate(self.max_history);
        write_json(&path, &rows)?;
        Ok(saved)
    }

    fn list_history(&self, workspace_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut rows: Vec<HistoryEntry> = read_json(&self.history_path(workspace_id)?)?;
        rows.truncate(limit);
        Ok(rows)
    }
}

/// A missing file reads as the empty value
fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

/// Write to a sibling temp file, then rename it over `path`
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
