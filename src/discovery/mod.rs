//! API discovery - finds a host's OpenAPI/Swagger document and catalogs its endpoints

pub mod engine;
pub mod models;
pub mod openapi;
pub mod probe;
pub mod progress;

pub use engine::DiscoveryEngine;
pub use models::*;
pub use openapi::extract_endpoints;
pub use progress::{FnSink, NoopSink, ProgressSink};

use crate::storage::StoreError;

/// Why a discovery run ended without a result.
///
/// Finding no spec document is not an error.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Superseded by a newer run or cancelled explicitly
    #[error("Discovery cancelled")]
    Cancelled,
    #[error("Failed to parse API specification as JSON")]
    InvalidDocument,
    #[error("Failed to save discovered endpoints: {0}")]
    Storage(#[from] StoreError),
}
