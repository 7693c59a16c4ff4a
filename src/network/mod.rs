//! Network layer - HTTP request execution and the engine actor
//!
//! The engine actor receives execution/discovery commands and sends back events.

pub mod actor;
pub mod client;

pub use actor::EngineActor;
pub use client::{create_client, ExecuteError, RequestExecutor};
