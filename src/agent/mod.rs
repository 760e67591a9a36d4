//! Agent boundary.
//!
//! An [`Agent`] is opaque: given a prompt, a dependency bundle and the prior
//! history it produces a stream of raw [`AgentEvent`]s. The
//! [`translator`] turns that stream into the normalized per-turn sequence the
//! rest of the application consumes.

pub mod anthropic;
pub mod events;
pub mod sse;
pub mod translator;

pub use anthropic::AnthropicAgent;
pub use events::{AgentResult, ToolArgs, ToolEndEvent, ToolStartEvent, TurnEvent};
pub use translator::{normalize_args, run_turn, stream_turn, EventTranslator, TranslateError};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::path::PathBuf;

use crate::sandbox::SandboxLimits;
use crate::store::Message;

/// Raw events an agent emits while working through one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Incremental response text.
    TextDelta(String),
    /// The agent decided to invoke a tool. `args` may be a serialized JSON
    /// string or an already structured object.
    ToolStart {
        call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },
    /// A previously started tool call finished.
    ToolEnd {
        call_id: String,
        result: serde_json::Value,
    },
    /// The agent's own account of its final answer.
    Final { output: Option<String> },
    /// The agent failed mid-turn.
    Fault(String),
}

pub type AgentEventStream = BoxStream<'static, anyhow::Result<AgentEvent>>;

/// What tools need from the outside world.
#[derive(Debug, Clone)]
pub struct ToolDeps {
    pub workspace_root: PathBuf,
    pub limits: SandboxLimits,
}

/// Everything an agent receives for one turn.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub prompt: String,
    pub deps: ToolDeps,
    /// Prior messages, oldest first, excluding the current prompt.
    pub history: Vec<Message>,
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Start a turn. An `Err` here means the agent could not even begin.
    async fn stream(&self, request: AgentRequest) -> anyhow::Result<AgentEventStream>;
}
