//! Discovery run: probe, parse, extract, persist

use std::sync::Arc;
use std::time::Duration;

use crate::cancel::{ActiveGuard, ActiveSlot};
use crate::constants::PROBE_TIMEOUT_MS;
use crate::discovery::models::{DiscoveryProgress, DiscoveryResult, DiscoveryStep};
use crate::discovery::openapi::{extract_endpoints, spec_title, spec_version};
use crate::discovery::probe::probe_for_spec;
use crate::discovery::progress::ProgressSink;
use crate::discovery::DiscoveryError;
use crate::storage::Storage;

/// Runs one discovery at a time; a new run cancels the one in progress
pub struct DiscoveryEngine {
    client: reqwest::Client,
    storage: Arc<dyn Storage>,
    probe_timeout: Duration,
    replace_existing: bool,
    active: ActiveSlot,
}

impl DiscoveryEngine {
    pub fn new(client: reqwest::Client, storage: Arc<dyn Storage>) -> Self {
        DiscoveryEngine {
            client,
            storage,
            probe_timeout: Duration::from_millis(PROBE_TIMEOUT_MS),
            replace_existing: false,
            active: ActiveSlot::new(),
        }
    }

    /// Replace the workspace's endpoints on completion instead of appending
    pub fn replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Probe `base_url` for a spec document and persist its endpoints.
    ///
    /// Finding no document is a successful, empty result. Nothing is
    /// persisted unless the run reaches the saving step uncancelled.
    pub async fn start_discovery(
        &self,
        workspace_id: &str,
        base_url: &str,
        progress: &dyn ProgressSink,
    ) -> Result<DiscoveryResult, DiscoveryError> {
        let guard = self.register();
        self.run_registered(guard, workspace_id, base_url, progress).await
    }

    /// Claim the run slot now, cancelling the run in progress
    pub fn register(&self) -> ActiveGuard {
        self.active.begin()
    }

    /// Drive a run claimed with [`register`](Self::register)
    pub async fn run_registered(
        &self,
        guard: ActiveGuard,
        workspace_id: &str,
        base_url: &str,
        progress: &dyn ProgressSink,
    ) -> Result<DiscoveryResult, DiscoveryError> {
        tracing::info!(workspace_id, base_url, "Starting discovery");

        progress.emit(DiscoveryProgress::new(DiscoveryStep::Starting, "Starting discovery...", 0, 0));
        progress.emit(DiscoveryProgress::new(
            DiscoveryStep::Probing,
            "Probing for API specification...",
            10,
            0,
        ));

        let Some(spec) = probe_for_spec(&self.client, base_url, self.probe_timeout, guard.token()).await? else {
            tracing::info!(base_url, "No API specification found");
            progress.emit(DiscoveryProgress::new(
                DiscoveryStep::Complete,
                "No API specification found",
                100,
                0,
            ));
            return Ok(DiscoveryResult::empty());
        };

        progress.emit(DiscoveryProgress::new(DiscoveryStep::Parsing, "Parsing specification...", 30, 0));

        let parsed = serde_json::from_str::<serde_json::Value>(&spec.content);
        if guard.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }
        let document = parsed.map_err(|e| {
            tracing::warn!(url = %spec.url, error = %e, "Specification is not valid JSON");
            DiscoveryError::InvalidDocument
        })?;

        let spec_version = spec_version(&document);
        let title = spec_title(&document);

        progress.emit(DiscoveryProgress::new(DiscoveryStep::Extracting, "Extracting endpoints...", 60, 0));

        let drafts = extract_endpoints(&document, &spec.url);

        progress.emit(DiscoveryProgress::new(
            DiscoveryStep::Saving,
            format!("Found {} endpoints, saving...", drafts.len()),
            80,
            drafts.len(),
        ));

        // A superseded run must not reach storage
        let committed = guard.commit(|| {
            if self.replace_existing {
                self.storage.replace_discovered_endpoints(workspace_id, drafts)
            } else {
                self.storage.save_discovered_endpoints(workspace_id, drafts)
            }
        });
        let saved = committed.ok_or(DiscoveryError::Cancelled)?.map_err(|e| {
            tracing::warn!(workspace_id, error = %e, "Failed to persist discovered endpoints");
            DiscoveryError::Storage(e)
        })?;

        progress.emit(DiscoveryProgress::new(
            DiscoveryStep::Complete,
            format!("Discovery complete! Found {} endpoints.", saved.len()),
            100,
            saved.len(),
        ));
        tracing::info!(workspace_id, spec_url = %spec.url, endpoints = saved.len(), "Discovery complete");

        Ok(DiscoveryResult {
            endpoints: saved,
            spec_url: Some(spec.url),
            spec_version,
            title,
        })
    }

    /// Abort the run in progress, if any
    pub fn cancel_discovery(&self) {
        if self.active.cancel() {
            tracing::info!("Cancelling discovery");
        }
    }

    /// Whether a run is in progress
    pub fn is_running(&self) -> bool {
        self.active.is_active()
    }
}
