//! Application constants
//!
//! Centralized location for magic strings and configuration defaults.

/// Application name
pub const APP_NAME: &str = "apiscout";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default per-phase timeout for executed requests
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Hard cap on the response body kept in memory (10 MiB)
pub const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Appended to a body cut at `MAX_RESPONSE_SIZE`
pub const TRUNCATION_MARKER: &str = "\n\n[Response truncated at 10MB]";

/// Per-phase timeout for each spec probe
pub const PROBE_TIMEOUT_MS: u64 = 5_000;

/// Accept header sent with every spec probe
pub const PROBE_ACCEPT: &str = "application/json, application/yaml, */*";

/// Well-known spec locations, tried in this order
pub const SPEC_PATHS: [&str; 10] = [
    "/openapi.json",
    "/openapi.yaml",
    "/swagger.json",
    "/swagger.yaml",
    "/api-docs",
    "/api-docs.json",
    "/v3/api-docs",
    "/v2/api-docs",
    "/docs/openapi.json",
    "/.well-known/openapi.json",
];

/// Default number of history rows listed and retained per workspace
pub const MAX_HISTORY: usize = 50;
