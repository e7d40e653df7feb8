//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{AppError, Result};

/// Default agent executable name, resolved on the search path.
fn default_agent_bin() -> String {
    "claude".to_owned()
}

/// Default grace period (seconds) between graceful signal and forceful kill.
fn default_grace_seconds() -> u64 {
    5
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Top-level application configuration.
///
/// Loaded from a TOML file via [`GlobalConfig::load`]; every field has a
/// serde default so a partial (or absent) file is valid.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Working directory for spawned agent processes.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Directory holding workflow definitions. Defaults to
    /// `<base_dir>/workflows` when absent.
    #[serde(default)]
    pub workflows_dir: Option<PathBuf>,
    /// Agent executable name (searched on `PATH`) or explicit path.
    #[serde(default = "default_agent_bin")]
    pub agent_bin: String,
    /// Seconds to wait for a graceful exit before force-killing on stop.
    #[serde(default = "default_grace_seconds")]
    pub grace_seconds: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            workflows_dir: None,
            agent_bin: default_agent_bin(),
            grace_seconds: default_grace_seconds(),
        }
    }
}

impl GlobalConfig {
    /// Load and parse configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the file cannot be read or does not
    /// parse as valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("cannot read {}: {err}", path.display())))?;
        let config: Self = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Resolved workflows directory (`workflows_dir` or `<base_dir>/workflows`).
    #[must_use]
    pub fn workflows_dir(&self) -> PathBuf {
        self.workflows_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("workflows"))
    }
}
