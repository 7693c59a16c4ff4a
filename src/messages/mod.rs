//! Message types for the channel-driven engine front end.
//!
//! Commands flow from a caller (CLI, UI) into the engine actor; events flow back.

pub mod network;

pub use network::{EngineCommand, EngineEvent};
