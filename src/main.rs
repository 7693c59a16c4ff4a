//! apiscout - send requests and discover API endpoints from the terminal
//!
//! Architecture:
//! - CLI layer - parses arguments and prints results
//! - Engine actor (Tokio) - executes requests and discovery runs
//! - File storage - endpoints, history and environments under the data dir

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use apiscout::config::Config;
use apiscout::discovery::{DiscoveredEndpoint, DiscoveryEngine, DiscoveryResult};
use apiscout::messages::{EngineCommand, EngineEvent};
use apiscout::models::{AuthType, HttpMethod, HttpRequestSpec, HttpResponseResult, NewHistoryEntry};
use apiscout::network::{create_client, EngineActor, RequestExecutor};
use apiscout::storage::{FileStore, Storage};

#[derive(Parser)]
#[command(name = "apiscout", version)]
#[command(about = "Send HTTP requests and discover API endpoints from OpenAPI documents")]
struct Cli {
    /// Config file (defaults to <config dir>/apiscout/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one HTTP request
    Send {
        /// GET, POST, PUT, PATCH, DELETE, HEAD or OPTIONS
        method: HttpMethod,
        /// Target URL, may contain {{variables}}
        url: String,
        /// Header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Request body
        #[arg(short = 'd', long)]
        data: Option<String>,
        /// Variable as name=value (repeatable, overrides --env)
        #[arg(long = "var")]
        vars: Vec<String>,
        /// Load variables from a saved environment
        #[arg(long)]
        env: Option<String>,
        /// Attach "Authorization: Bearer <token>"
        #[arg(long, conflicts_with = "basic")]
        bearer: Option<String>,
        /// Attach Basic auth from "user:password"
        #[arg(long)]
        basic: Option<String>,
        /// Timeout in milliseconds for headers and body each
        #[arg(long)]
        timeout: Option<u64>,
        /// Record the exchange in this workspace's history
        #[arg(long)]
        workspace: Option<String>,
        /// Print the normalized response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Probe a host for an OpenAPI/Swagger document and store its endpoints
    Discover {
        /// Base URL of the API, e.g. http://localhost:8080
        base_url: String,
        #[arg(long, default_value = "default")]
        workspace: String,
        /// Replace previously discovered endpoints instead of appending
        #[arg(long)]
        replace: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored endpoints of a workspace
    Endpoints {
        #[arg(long, default_value = "default")]
        workspace: String,
    },
    /// Delete stored endpoints of a workspace
    Clear {
        #[arg(long, default_value = "default")]
        workspace: String,
    },
    /// Show recent requests of a workspace
    History {
        #[arg(long, default_value = "default")]
        workspace: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Handles to a running engine actor
struct Engine {
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
    event_rx: mpsc::UnboundedReceiver<EngineEvent>,
    handle: JoinHandle<()>,
}

impl Engine {
    fn spawn(config: &Config, storage: Arc<dyn Storage>, replace: bool) -> Self {
        let client = create_client(config.user_agent.as_deref());
        let executor = Arc::new(RequestExecutor::new(client.clone()).with_default_timeout(config.default_timeout_ms));
        let discovery = Arc::new(
            DiscoveryEngine::new(client, storage).replace_existing(replace || config.replace_on_rediscovery),
        );

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<EngineCommand>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<EngineEvent>();
        let handle = tokio::spawn(EngineActor::new(executor, discovery, event_tx).run(cmd_rx));

        Engine { cmd_tx, event_rx, handle }
    }

    /// Wait for the next event; Ctrl-C sends `on_interrupt` and keeps waiting
    async fn next_event(&mut self, on_interrupt: fn() -> EngineCommand) -> Result<EngineEvent> {
        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    return event.ok_or_else(|| anyhow!("engine stopped unexpectedly"));
                }
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("Cancelling...");
                    self.cmd_tx.send(on_interrupt())?;
                }
            }
        }
    }

    async fn shutdown(self) -> Result<()> {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        self.handle.await.context("engine task panicked")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let data_dir = config.data_dir();
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    // Initialize logging to file
    let file_appender = tracing_appender::rolling::never(&data_dir, "apiscout.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    let store = Arc::new(FileStore::new(&data_dir).with_max_history(config.history_limit));

    match cli.command {
        Commands::Send { method, url, headers, data, vars, env, bearer, basic, timeout, workspace, json } => {
            let mut request = HttpRequestSpec::new(method, url);
            request.body = data;
            request.timeout_ms = timeout;
            for header in &headers {
                let (name, value) = split_pair(header, ':')
                    .ok_or_else(|| anyhow!("invalid header {:?}, expected \"Name: value\"", header))?;
                request.headers.insert(name, value);
            }
            auth_from_args(bearer, basic)?.apply(&mut request.headers);
            request.variables = collect_variables(&store, env.as_deref(), &vars)?;

            let mut engine = Engine::spawn(&config, store.clone(), false);
            engine.cmd_tx.send(EngineCommand::Execute { id: 1, request: request.clone() })?;
            let result = loop {
                if let EngineEvent::RequestFinished { result, .. } =
                    engine.next_event(|| EngineCommand::CancelRequest).await?
                {
                    break result;
                }
            };
            engine.shutdown().await?;

            if let Some(workspace) = workspace {
                let entry = NewHistoryEntry::from_outcome(workspace, None, &request, &result);
                if let Err(e) = store.save_history_entry(entry) {
                    tracing::warn!(error = %e, "Failed to record history");
                    eprintln!("warning: failed to record history: {}", e);
                }
            }

            let response = result?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&response);
            }
        }

        Commands::Discover { base_url, workspace, replace, json } => {
            let mut engine = Engine::spawn(&config, store.clone(), replace);
            engine.cmd_tx.send(EngineCommand::Discover { workspace_id: workspace, base_url })?;
            let result = loop {
                match engine.next_event(|| EngineCommand::CancelDiscovery).await? {
                    EngineEvent::DiscoveryProgress(p) => eprintln!("[{:>3}%] {:<10} {}", p.progress, p.step.as_str(), p.message),
                    EngineEvent::DiscoveryFinished { result, .. } => break result,
                    EngineEvent::RequestFinished { .. } => {}
                }
            };
            engine.shutdown().await?;

            let result = result?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_discovery(&result);
            }
        }

        Commands::Endpoints { workspace } => {
            let endpoints = store.list_discovered_endpoints(&workspace)?;
            if endpoints.is_empty() {
                println!("No endpoints stored for workspace {:?}", workspace);
            }
            for endpoint in &endpoints {
                println!("{}", endpoint_line(endpoint));
            }
        }

        Commands::Clear { workspace } => {
            store.clear_discovered_endpoints(&workspace)?;
            println!("Cleared endpoints of workspace {:?}", workspace);
        }

        Commands::History { workspace, limit } => {
            let rows = store.list_history(&workspace, limit.unwrap_or(config.history_limit))?;
            for row in &rows {
                let outcome = match (row.entry.status_code, &row.entry.error_message) {
                    (Some(status), _) => status.to_string(),
                    (None, Some(error)) => format!("error: {}", error),
                    (None, None) => "-".to_string(),
                };
                println!(
                    "{}  {:<7} {}  {}  {}ms",
                    row.executed_at.format("%Y-%m-%d %H:%M:%S"),
                    row.entry.method,
                    row.entry.url,
                    outcome,
                    row.entry.response_time_ms.unwrap_or(0),
                );
            }
        }
    }

    Ok(())
}

/// Split "name<sep>value", trimming both halves
fn split_pair(input: &str, separator: char) -> Option<(String, String)> {
    let (name, value) = input.split_once(separator)?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

fn auth_from_args(bearer: Option<String>, basic: Option<String>) -> Result<AuthType> {
    if let Some(token) = bearer {
        return Ok(AuthType::Bearer(token));
    }
    match basic {
        Some(credentials) => {
            let (username, password) = credentials
                .split_once(':')
                .ok_or_else(|| anyhow!("--basic expects \"user:password\""))?;
            Ok(AuthType::Basic { username: username.to_string(), password: password.to_string() })
        }
        None => Ok(AuthType::None),
    }
}

/// `None` when neither an environment nor `--var` was given, so no substitution happens
fn collect_variables(store: &FileStore, env: Option<&str>, vars: &[String]) -> Result<Option<HashMap<String, String>>> {
    if env.is_none() && vars.is_empty() {
        return Ok(None);
    }

    let mut variables = match env {
        Some(name) => store
            .load_environment(name)
            .with_context(|| format!("failed to load environment {:?}", name))?
            .variables,
        None => HashMap::new(),
    };
    for var in vars {
        let Some((name, value)) = split_pair(var, '=') else {
            bail!("invalid variable {:?}, expected name=value", var);
        };
        variables.insert(name, value);
    }
    Ok(Some(variables))
}

fn print_response(response: &HttpResponseResult) {
    println!(
        "HTTP {} {}  ({} bytes, {} ms)",
        response.status_code, response.status_text, response.size, response.timing.total_time
    );
    let mut headers: Vec<_> = response.headers.iter().collect();
    headers.sort();
    for (name, value) in headers {
        println!("{}: {}", name, value);
    }
    println!();

    // Pretty-print JSON bodies
    match serde_json::from_str::<serde_json::Value>(&response.body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json).unwrap_or_else(|_| response.body.clone())),
        Err(_) => println!("{}", response.body),
    }
    if response.is_truncated {
        eprintln!("warning: response body truncated");
    }
}

fn print_discovery(result: &DiscoveryResult) {
    let Some(spec_url) = &result.spec_url else {
        println!("No API specification found");
        return;
    };
    println!(
        "{} (spec {}) from {}",
        result.title.as_deref().unwrap_or("Untitled API"),
        result.spec_version.as_deref().unwrap_or("unknown"),
        spec_url
    );
    println!("{} endpoints saved", result.endpoints.len());
    for endpoint in &result.endpoints {
        println!("  {}", endpoint_line(endpoint));
    }
}

fn endpoint_line(endpoint: &DiscoveredEndpoint) -> String {
    let ep = &endpoint.endpoint;
    let mut flags = String::new();
    if ep.auth_required {
        flags.push_str(" [auth]");
    }
    if ep.deprecated {
        flags.push_str(" [deprecated]");
    }
    match &ep.summary {
        Some(summary) => format!("{:<7} {}  {}{}", ep.method, ep.path, summary, flags),
        None => format!("{:<7} {}{}", ep.method, ep.path, flags),
    }
}
