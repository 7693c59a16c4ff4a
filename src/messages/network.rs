//! Engine messages - communication between a front end and the engine actor

use crate::discovery::{DiscoveryError, DiscoveryProgress, DiscoveryResult};
use crate::models::{HttpRequestSpec, HttpResponseResult};
use crate::network::client::ExecuteError;

/// Commands sent from a front end to the engine actor
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Execute an HTTP request, superseding any request in flight
    Execute {
        id: u64,
        request: HttpRequestSpec,
    },
    /// Cancel the request in flight
    CancelRequest,
    /// Start a discovery run, superseding any run in progress
    Discover {
        workspace_id: String,
        base_url: String,
    },
    /// Cancel the discovery run in progress
    CancelDiscovery,
    /// Shutdown the engine actor
    Shutdown,
}

/// Events sent from the engine actor back to the front end
#[derive(Debug)]
pub enum EngineEvent {
    /// An execution finished, successfully or not
    RequestFinished {
        id: u64,
        result: Result<HttpResponseResult, ExecuteError>,
    },
    /// A discovery run moved forward
    DiscoveryProgress(DiscoveryProgress),
    /// A discovery run ended
    DiscoveryFinished {
        workspace_id: String,
        result: Result<DiscoveryResult, DiscoveryError>,
    },
}
