//! User configuration, read from `config.yaml`

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{APP_NAME, DEFAULT_TIMEOUT_MS, MAX_HISTORY};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where endpoints, history, environments and the log file live
    pub data_dir: Option<PathBuf>,
    /// Per-phase timeout for requests that do not set their own
    pub default_timeout_ms: u64,
    /// History rows listed and retained per workspace
    pub history_limit: usize,
    /// Replace a workspace's endpoints on rediscovery instead of appending
    pub replace_on_rediscovery: bool,
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: None,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            history_limit: MAX_HISTORY,
            replace_on_rediscovery: false,
            user_agent: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file deserializes to unit, not to a mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// `<config_dir>/apiscout/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.yaml"))
    }

    /// Configured data directory, else `~/.apiscout`
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(format!(".{}", APP_NAME))
        })
    }
}
