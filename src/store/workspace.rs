//! Workspace directory layout and per-agent configuration.
//!
//! ```text
//! <root>/
//!   agents/<name>/config.toml
//!   conversations/<thread_id>/messages.jsonl
//!   files/
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{validate_name, ConversationStore};

pub const DEFAULT_AGENT: &str = "default";

const AGENT_CONFIG_FILE: &str = "config.toml";

/// Name, model and persona of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_persona")]
    pub persona: String,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_persona() -> String {
    "You are a helpful assistant.".to_string()
}

impl AgentConfig {
    fn default_agent() -> Self {
        Self {
            name: DEFAULT_AGENT.to_string(),
            model: default_model(),
            persona: "You are a helpful assistant with access to file system tools.\n\
                      You can read, write, and edit files in the workspace.\n\
                      Always be helpful and concise.\n"
                .to_string(),
        }
    }
}

/// An on-disk workspace: the sandbox root plus agent configs and threads.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open `root`, creating the directory structure if it is missing.
    pub fn open(root: &Path) -> Result<Self> {
        for sub in ["agents", "conversations", "files"] {
            let dir = root.join(sub);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let root = std::fs::canonicalize(root)
            .with_context(|| format!("Failed to resolve workspace {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn conversations(&self) -> ConversationStore {
        ConversationStore::new(self.root.join("conversations"))
    }

    fn agent_config_path(&self, name: &str) -> Result<PathBuf> {
        validate_name("agent name", name)?;
        Ok(self.root.join("agents").join(name).join(AGENT_CONFIG_FILE))
    }

    pub fn load_agent_config(&self, name: &str) -> Result<AgentConfig> {
        let path = self.agent_config_path(name)?;
        if !path.is_file() {
            anyhow::bail!("Agent config not found: {}", path.display());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Write the default agent's config if it does not exist yet, then load it.
    pub fn create_default_agent(&self) -> Result<AgentConfig> {
        let path = self.agent_config_path(DEFAULT_AGENT)?;
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let raw = toml::to_string_pretty(&AgentConfig::default_agent())
                .map_err(|e| anyhow::anyhow!("Failed to serialize default agent: {e}"))?;
            std::fs::write(&path, raw)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "created default agent");
        }
        self.load_agent_config(DEFAULT_AGENT)
    }

    /// Names of agents that have a config file, sorted.
    pub fn list_agents(&self) -> Result<Vec<String>> {
        let dir = self.root.join("agents");
        let mut names: Vec<String> = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().join(AGENT_CONFIG_FILE).is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Load `name`, creating the default agent on demand.
    pub fn resolve_agent(&self, name: &str) -> Result<AgentConfig> {
        validate_name("agent name", name)?;
        if name == DEFAULT_AGENT && !self.agent_config_path(name)?.exists() {
            return self.create_default_agent();
        }
        self.load_agent_config(name).with_context(|| {
            let available = self.list_agents().unwrap_or_default();
            format!("Agent '{name}' not found. Available agents: {available:?}")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_structure() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::open(&tmp.path().join("ws")).unwrap();
        for sub in ["agents", "conversations", "files"] {
            assert!(ws.root().join(sub).is_dir(), "{sub}");
        }
        assert!(ws.list_agents().unwrap().is_empty());
    }

    #[test]
    fn default_agent_is_created_once() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();

        let created = ws.create_default_agent().unwrap();
        assert_eq!(created.name, DEFAULT_AGENT);
        assert!(created.persona.contains("file system tools"));

        // A user edit survives a second call.
        let path = ws.agent_config_path(DEFAULT_AGENT).unwrap();
        std::fs::write(&path, "name = \"default\"\npersona = \"Be terse.\"\n").unwrap();
        let reloaded = ws.create_default_agent().unwrap();
        assert_eq!(reloaded.persona, "Be terse.");
        assert_eq!(reloaded.model, default_model());

        assert_eq!(ws.list_agents().unwrap(), vec![DEFAULT_AGENT]);
    }

    #[test]
    fn missing_agent_lists_alternatives() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        ws.create_default_agent().unwrap();

        let err = ws.resolve_agent("reviewer").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Agent 'reviewer' not found"), "{msg}");
        assert!(msg.contains("default"), "{msg}");
    }

    #[test]
    fn resolve_default_creates_it() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        assert_eq!(ws.resolve_agent(DEFAULT_AGENT).unwrap().name, DEFAULT_AGENT);
    }

    #[test]
    fn agent_names_cannot_leave_the_agents_dir() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::open(&tmp.path().join("ws")).unwrap();
        let stray = tmp.path().join("stray");
        std::fs::create_dir_all(&stray).unwrap();
        std::fs::write(stray.join(AGENT_CONFIG_FILE), "name = \"stray\"\n").unwrap();

        let err = ws.resolve_agent("../../stray").unwrap_err();
        assert!(format!("{err:#}").contains("Invalid agent name"), "{err:#}");
        assert!(ws.load_agent_config("../../stray").is_err());
        assert!(ws.resolve_agent("..").is_err());
    }
}
