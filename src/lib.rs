//! # apiscout
//!
//! Request execution and API discovery engine for API testing tools.
//!
//! ## Features
//! - HTTP methods: GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS
//! - `{{variable}}` substitution in URL, header values and body
//! - Single-flight execution with cancellation
//! - Responses capped at 10 MB, original size reported
//! - OpenAPI/Swagger discovery over well-known URLs with progress events
//! - Request history and discovered endpoints persisted per workspace
//!
//! ## Architecture
//! Actor-based with channels:
//! - Front end (CLI, UI) - sends `EngineCommand`s
//! - Engine actor (Tokio runtime) - drives the executor and discovery engine
//! - Storage - memory or JSON files

pub mod cancel;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod messages;
pub mod models;
pub mod network;
pub mod storage;
pub mod variables;

// Re-export commonly used types
pub use config::Config;
pub use models::{AuthType, Environment, HttpMethod, HttpRequestSpec, HttpResponseResult, RequestTiming};
pub use discovery::{DiscoveredEndpoint, DiscoveryEngine, DiscoveryError, DiscoveryProgress, DiscoveryResult, ProgressSink};
pub use messages::{EngineCommand, EngineEvent};
pub use network::{EngineActor, ExecuteError, RequestExecutor};
pub use storage::{FileStore, MemoryStore, Storage, StoreError};
pub use variables::{resolve, resolve_request};
