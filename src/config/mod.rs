//! Global configuration.
//!
//! Loaded from `$BURROW_CONFIG` or `<platform config dir>/config.toml`. A
//! missing file yields defaults; `ANTHROPIC_API_KEY` overrides `api_key`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sandbox::SandboxLimits;

pub const CONFIG_ENV: &str = "BURROW_CONFIG";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_url: String,
    pub max_tokens: u32,
    /// Upper bound on model ↔ tool round trips within one turn.
    pub max_tool_rounds: usize,
    pub default_workspace: String,
    pub sandbox: SandboxLimits,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            max_tokens: 4096,
            max_tool_rounds: 25,
            default_workspace: "workspace".to_string(),
            sandbox: SandboxLimits::default(),
            render: RenderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub spinner_interval_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            spinner_interval_ms: 150,
        }
    }
}

impl RenderConfig {
    pub fn spinner_interval(&self) -> Duration {
        Duration::from_millis(self.spinner_interval_ms.max(1))
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("", "", "burrow")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.api_key = Some(key);
            }
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// `default_workspace` with `~` and environment variables expanded.
    pub fn workspace_dir(&self) -> PathBuf {
        match shellexpand::full(&self.default_workspace) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(_) => PathBuf::from(&self.default_workspace),
        }
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("No API key configured. Set {API_KEY_ENV} or api_key in the config file.")
            })
    }
}
