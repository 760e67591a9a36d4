//! Normalized per-turn events.

use serde::{Deserialize, Serialize};

use crate::store::ToolCall;

/// Canonical tool argument mapping; keys keep their arrival order.
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// Emitted once per tool invocation, before it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStartEvent {
    pub tool_call_id: String,
    pub tool_name: String,
    pub args: ToolArgs,
}

/// Emitted once per tool invocation, after it finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEndEvent {
    pub tool_call_id: String,
    pub result: String,
}

/// Terminal outcome of a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub response: String,
    pub tool_calls: Vec<ToolCall>,
    pub error: Option<String>,
}

impl AgentResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            response: String::new(),
            tool_calls: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One step of a translated turn. A turn is zero or more deltas and tool
/// events followed by exactly one `Result`.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    TextDelta(String),
    ToolStart(ToolStartEvent),
    ToolEnd(ToolEndEvent),
    Result(AgentResult),
}
