//! Persistence layer: conversation threads and the workspace directory
//! layout that holds them.
//!
//! Threads are append-only JSONL logs, one [`Message`] per line, stored under
//! `<workspace>/conversations/<thread_id>/messages.jsonl`.

pub mod conversation;
pub mod workspace;

pub use conversation::ConversationStore;
pub use workspace::{AgentConfig, Workspace};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// A tool invocation recorded on an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub result: Option<String>,
}

/// One entry in a conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            agent_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, agent_id: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            agent_id: Some(agent_id.to_string()),
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }
}

/// Thread ids and agent names become directory names, so they are limited
/// to `[A-Za-z0-9_-]+`.
pub(crate) fn validate_name(kind: &str, name: &str) -> anyhow::Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        anyhow::bail!("Invalid {kind} {name:?}: use letters, digits, '-' or '_'");
    }
    Ok(())
}
