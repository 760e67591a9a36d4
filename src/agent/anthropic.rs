//! Anthropic Messages API agent.
//!
//! Each round posts the running transcript with `stream: true`, forwards text
//! deltas as they arrive and collects `tool_use` blocks. When the model stops
//! for tools, every call is executed against the request's sandbox and the
//! results are fed back as `tool_result` blocks. The loop ends on the first
//! round without tool use.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::sse::SseBuffer;
use super::translator::normalize_args;
use super::{Agent, AgentEvent, AgentEventStream, AgentRequest};
use crate::config::Config;
use crate::sandbox::{Sandbox, SandboxError, ERROR_PREFIX};
use crate::store::{AgentConfig, Message, Role};
use crate::tools::{ToolRegistry, ToolSpec};

const ANTHROPIC_VERSION: &str = "2023-06-01";

type EventSender = mpsc::Sender<Result<AgentEvent>>;

/// A named agent backed by one Anthropic model.
#[derive(Debug, Clone)]
pub struct AnthropicAgent {
    name: String,
    model: String,
    persona: String,
    api_key: String,
    api_url: String,
    max_tokens: u32,
    max_tool_rounds: usize,
    http: reqwest::Client,
}

impl AnthropicAgent {
    pub fn new(agent: &AgentConfig, config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            name: agent.name.clone(),
            model: agent.model.clone(),
            persona: agent.persona.clone(),
            api_key: config.require_api_key()?.to_string(),
            api_url: config.api_url.clone(),
            max_tokens: config.max_tokens,
            max_tool_rounds: config.max_tool_rounds,
            http,
        })
    }

    async fn run(&self, request: AgentRequest, registry: ToolRegistry, tx: &EventSender) -> Result<()> {
        let tools = registry.specs();
        let mut messages = replay_history(&request.history);
        messages.push(ApiMessage::user(vec![ContentBlock::Text {
            text: request.prompt,
        }]));

        for round in 1..=self.max_tool_rounds {
            let outcome = self.stream_round(&messages, &tools, tx).await?;
            debug!(
                agent = %self.name,
                round,
                tool_uses = outcome.tool_uses.len(),
                stop_reason = outcome.stop_reason.as_deref().unwrap_or("none"),
                "round finished"
            );
            if outcome.tool_uses.is_empty() {
                emit(tx, AgentEvent::Final {
                    output: Some(outcome.text),
                })
                .await?;
                return Ok(());
            }

            let mut assistant = Vec::new();
            if !outcome.text.is_empty() {
                assistant.push(ContentBlock::Text {
                    text: outcome.text.clone(),
                });
            }
            let mut results = Vec::new();
            for call in outcome.tool_uses.into_values() {
                let input = Value::Object(normalize_args(Value::String(call.input_json.clone())));
                emit(tx, AgentEvent::ToolStart {
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    args: Value::String(call.input_json),
                })
                .await?;

                let (content, is_error) = match registry.execute(&call.name, input.clone()).await {
                    Ok(result) => (result.output, !result.success),
                    Err(err) => {
                        if let Some(violation) = err.downcast_ref::<SandboxError>() {
                            warn!(tool = %call.name, error = %violation, "blocked tool call");
                        } else {
                            warn!(tool = %call.name, error = %err, "tool call failed");
                        }
                        (format!("{ERROR_PREFIX}{err}"), true)
                    }
                };

                emit(tx, AgentEvent::ToolEnd {
                    call_id: call.id.clone(),
                    result: Value::String(content.clone()),
                })
                .await?;

                assistant.push(ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name,
                    input,
                });
                results.push(ContentBlock::ToolResult {
                    tool_use_id: call.id,
                    content,
                    is_error,
                });
            }
            messages.push(ApiMessage::assistant(assistant));
            messages.push(ApiMessage::user(results));
        }

        anyhow::bail!(
            "Agent exceeded {} tool rounds without a final answer",
            self.max_tool_rounds
        )
    }

    async fn stream_round(
        &self,
        messages: &[ApiMessage],
        tools: &[ToolSpec],
        tx: &EventSender,
    ) -> Result<RoundOutcome> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: &self.persona,
            messages,
            tools,
            stream: true,
        };
        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API returned {status}: {text}");
        }

        let mut round = RoundOutcome::default();
        let mut sse = SseBuffer::default();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.context("Anthropic stream interrupted")?;
            for payload in sse.push(&chunk) {
                if let Some(delta) = round.apply(&payload)? {
                    emit(tx, AgentEvent::TextDelta(delta)).await?;
                }
            }
        }
        if let Some(payload) = sse.finish() {
            if let Some(delta) = round.apply(&payload)? {
                emit(tx, AgentEvent::TextDelta(delta)).await?;
            }
        }
        Ok(round)
    }
}

#[async_trait]
impl Agent for AnthropicAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: AgentRequest) -> Result<AgentEventStream> {
        let sandbox = Sandbox::new(&request.deps.workspace_root, request.deps.limits)?;
        let registry = ToolRegistry::for_sandbox(Arc::new(sandbox));
        let (tx, rx) = mpsc::channel(64);
        let agent = self.clone();
        tokio::spawn(async move {
            if let Err(err) = agent.run(request, registry, &tx).await {
                // The receiver may already be gone; nothing left to report to.
                let _ = tx.send(Ok(AgentEvent::Fault(format!("{err:#}")))).await;
            }
        });
        Ok(ReceiverStream::new(rx).boxed())
    }
}

async fn emit(tx: &EventSender, event: AgentEvent) -> Result<()> {
    tx.send(Ok(event))
        .await
        .map_err(|_| anyhow::anyhow!("Turn was abandoned by its consumer"))
}

/// Prior user and assistant text, in order. Other roles are not replayed.
fn replay_history(history: &[Message]) -> Vec<ApiMessage> {
    history
        .iter()
        .filter(|message| !message.content.trim().is_empty())
        .filter_map(|message| {
            let text = vec![ContentBlock::Text {
                text: message.content.clone(),
            }];
            match message.role {
                Role::User => Some(ApiMessage::user(text)),
                Role::Assistant => Some(ApiMessage::assistant(text)),
                Role::System | Role::Tool => None,
            }
        })
        .collect()
}

// ── Wire types ──────────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ApiMessage],
    tools: &'a [ToolSpec],
    stream: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

impl ApiMessage {
    fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: "user",
            content,
        }
    }

    fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: "assistant",
            content,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockStart {
        index: usize,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    MessageDelta {
        delta: MessageDeltaBody,
    },
    Error {
        error: ApiError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    kind: String,
    message: String,
}

#[derive(Debug)]
struct PendingToolUse {
    id: String,
    name: String,
    input_json: String,
}

/// What one streamed round produced.
#[derive(Debug, Default)]
struct RoundOutcome {
    text: String,
    /// Content block index → tool use, so calls keep the model's order.
    tool_uses: BTreeMap<usize, PendingToolUse>,
    stop_reason: Option<String>,
}

impl RoundOutcome {
    /// Fold one SSE payload in, returning any text delta to forward.
    fn apply(&mut self, payload: &str) -> Result<Option<String>> {
        let event: StreamEvent = serde_json::from_str(payload)
            .with_context(|| format!("Failed to parse stream event: {payload}"))?;
        match event {
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => match content_block {
                BlockStart::ToolUse { id, name } => {
                    self.tool_uses.insert(
                        index,
                        PendingToolUse {
                            id,
                            name,
                            input_json: String::new(),
                        },
                    );
                }
                BlockStart::Text { text } if !text.is_empty() => {
                    self.text.push_str(&text);
                    return Ok(Some(text));
                }
                BlockStart::Text { .. } | BlockStart::Unknown => {}
            },
            StreamEvent::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } => {
                    self.text.push_str(&text);
                    return Ok(Some(text));
                }
                BlockDelta::InputJsonDelta { partial_json } => {
                    if let Some(call) = self.tool_uses.get_mut(&index) {
                        call.input_json.push_str(&partial_json);
                    }
                }
                BlockDelta::Unknown => {}
            },
            StreamEvent::MessageDelta { delta } => {
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
            }
            StreamEvent::Error { error } => {
                anyhow::bail!("Anthropic stream error ({}): {}", error.kind, error.message);
            }
            StreamEvent::Unknown => {}
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn round_collects_text_and_tool_input() {
        let mut round = RoundOutcome::default();
        let payloads = [
            r#"{"type":"message_start","message":{"id":"m1","usage":{"input_tokens":3}}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Let me look."}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"ls","input":{}}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"path\":"}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":" \".\"}"}}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":9}}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"message_stop"}"#,
        ];
        let deltas: Vec<String> = payloads
            .iter()
            .filter_map(|payload| round.apply(payload).unwrap())
            .collect();

        assert_eq!(deltas, vec!["Let me look."]);
        assert_eq!(round.text, "Let me look.");
        assert_eq!(round.stop_reason.as_deref(), Some("tool_use"));
        let call = &round.tool_uses[&1];
        assert_eq!(call.id, "toolu_1");
        assert_eq!(call.name, "ls");
        assert_eq!(call.input_json, "{\"path\": \".\"}");
    }

    #[test]
    fn stream_error_event_fails_the_round() {
        let mut round = RoundOutcome::default();
        let err = round
            .apply(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Overloaded"), "{err}");
    }

    #[test]
    fn history_replays_only_conversational_text() {
        let history = vec![
            Message::user("hello"),
            Message::assistant("", "default", vec![]),
            Message {
                role: Role::System,
                content: "ignored".into(),
                timestamp: Utc::now(),
                agent_id: None,
                tool_calls: vec![],
            },
            Message::assistant("hi there", "default", vec![]),
        ];
        let replayed = replay_history(&history);
        let roles: Vec<&str> = replayed.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["user", "assistant"]);
    }

    #[test]
    fn tool_result_block_wire_shape() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "toolu_1".into(),
            content: "Error: File not found: x".into(),
            is_error: true,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["tool_use_id"], "toolu_1");
        assert_eq!(json["is_error"], true);
    }
}
