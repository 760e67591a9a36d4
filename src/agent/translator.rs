//! Raw agent stream → normalized turn events.
//!
//! The translator owns the per-turn accumulator (tool calls, response text,
//! open call ids). Every translated turn ends with exactly one
//! [`TurnEvent::Result`], also when the agent faults; events already yielded
//! before a fault are not retracted.

use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::events::{AgentResult, ToolArgs, ToolEndEvent, ToolStartEvent, TurnEvent};
use super::{Agent, AgentEvent, AgentEventStream, AgentRequest};
use crate::store::ToolCall;
use crate::tools::ALL_TOOL_NAMES;

/// Protocol violations in a raw agent stream.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("Malformed agent stream: tool end for unknown call id '{0}'")]
    UnknownCallId(String),
    #[error("Malformed agent stream: duplicate tool call id '{0}'")]
    DuplicateCallId(String),
    #[error("{0}")]
    AgentFault(String),
}

/// Coerce a tool argument payload into the canonical mapping.
///
/// Objects pass through, JSON strings are parsed, `null` and the empty string
/// become an empty map. Anything else is wrapped as `{"input": value}`.
pub fn normalize_args(raw: Value) -> ToolArgs {
    match raw {
        Value::Object(map) => map,
        Value::Null => ToolArgs::new(),
        Value::String(text) if text.trim().is_empty() => ToolArgs::new(),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            _ => wrap_input(Value::String(text)),
        },
        other => wrap_input(other),
    }
}

fn wrap_input(value: Value) -> ToolArgs {
    let mut args = ToolArgs::new();
    args.insert("input".to_string(), value);
    args
}

fn stringify_result(result: Value) -> String {
    match result {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Accumulator for one turn.
#[derive(Debug, Default)]
pub struct EventTranslator {
    tool_calls: Vec<ToolCall>,
    full_response: String,
    /// Open call id → index into `tool_calls`.
    open: HashMap<String, usize>,
    seen: HashSet<String>,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one raw event. `Ok(None)` means the event only updated the
    /// accumulator.
    pub fn accept(&mut self, event: AgentEvent) -> Result<Option<TurnEvent>, TranslateError> {
        match event {
            AgentEvent::TextDelta(delta) => {
                if delta.is_empty() {
                    return Ok(None);
                }
                self.full_response.push_str(&delta);
                Ok(Some(TurnEvent::TextDelta(delta)))
            }
            AgentEvent::ToolStart {
                call_id,
                tool_name,
                args,
            } => {
                if !self.seen.insert(call_id.clone()) {
                    return Err(TranslateError::DuplicateCallId(call_id));
                }
                if !ALL_TOOL_NAMES.contains(&tool_name.as_str()) {
                    debug!(tool = %tool_name, "agent invoked a tool outside the registry");
                }
                let args = normalize_args(args);
                self.open.insert(call_id.clone(), self.tool_calls.len());
                self.tool_calls.push(ToolCall {
                    name: tool_name.clone(),
                    args: args.clone(),
                    result: None,
                });
                debug!(call_id = %call_id, tool = %tool_name, "tool start");
                Ok(Some(TurnEvent::ToolStart(ToolStartEvent {
                    tool_call_id: call_id,
                    tool_name,
                    args,
                })))
            }
            AgentEvent::ToolEnd { call_id, result } => {
                let Some(index) = self.open.remove(&call_id) else {
                    return Err(TranslateError::UnknownCallId(call_id));
                };
                let result = stringify_result(result);
                self.tool_calls[index].result = Some(result.clone());
                debug!(call_id = %call_id, bytes = result.len(), "tool end");
                Ok(Some(TurnEvent::ToolEnd(ToolEndEvent {
                    tool_call_id: call_id,
                    result,
                })))
            }
            AgentEvent::Final { output } => {
                if let Some(output) = output.filter(|text| !text.is_empty()) {
                    self.full_response = output;
                }
                Ok(None)
            }
            AgentEvent::Fault(message) => Err(TranslateError::AgentFault(message)),
        }
    }

    /// Successful end of stream.
    pub fn finish(self) -> AgentResult {
        AgentResult {
            response: self.full_response,
            tool_calls: self.tool_calls,
            error: None,
        }
    }

    /// Turn-level failure. The response is dropped; tool calls already
    /// recorded are kept so history shows what ran.
    pub fn fail(self, error: impl Into<String>) -> AgentResult {
        AgentResult {
            response: String::new(),
            tool_calls: self.tool_calls,
            error: Some(error.into()),
        }
    }
}

enum TranslateState {
    Streaming {
        events: AgentEventStream,
        translator: EventTranslator,
    },
    Done,
}

/// Translate a raw event stream into turn events.
pub fn translate(events: AgentEventStream) -> BoxStream<'static, TurnEvent> {
    let initial = TranslateState::Streaming {
        events,
        translator: EventTranslator::new(),
    };
    stream::unfold(initial, |state| async move {
        let TranslateState::Streaming {
            mut events,
            mut translator,
        } = state
        else {
            return None;
        };
        loop {
            match events.next().await {
                Some(Ok(event)) => match translator.accept(event) {
                    Ok(Some(out)) => {
                        return Some((out, TranslateState::Streaming { events, translator }))
                    }
                    Ok(None) => continue,
                    Err(err) => {
                        debug!(error = %err, "turn failed");
                        let result = translator.fail(err.to_string());
                        return Some((TurnEvent::Result(result), TranslateState::Done));
                    }
                },
                Some(Err(err)) => {
                    debug!(error = %err, "agent stream errored");
                    let result = translator.fail(format!("{err:#}"));
                    return Some((TurnEvent::Result(result), TranslateState::Done));
                }
                None => {
                    return Some((TurnEvent::Result(translator.finish()), TranslateState::Done))
                }
            }
        }
    })
    .boxed()
}

/// Start a turn on `agent` and translate its events. A failure to start the
/// turn yields a single error result.
pub async fn stream_turn(agent: &dyn Agent, request: AgentRequest) -> BoxStream<'static, TurnEvent> {
    match agent.stream(request).await {
        Ok(events) => translate(events),
        Err(err) => {
            debug!(agent = agent.name(), error = %err, "agent call failed");
            stream::once(async move { TurnEvent::Result(AgentResult::failed(format!("{err:#}"))) })
                .boxed()
        }
    }
}

/// Non-streaming variant: run the whole turn and return its result.
pub async fn run_turn(agent: &dyn Agent, request: AgentRequest) -> AgentResult {
    let mut events = stream_turn(agent, request).await;
    let mut outcome = None;
    while let Some(event) = events.next().await {
        if let TurnEvent::Result(result) = event {
            outcome = Some(result);
        }
    }
    outcome.unwrap_or_else(|| AgentResult::failed("Agent stream ended without a result"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ToolDeps;
    use crate::sandbox::SandboxLimits;
    use async_trait::async_trait;
    use serde_json::json;

    struct Scripted {
        events: Vec<AgentEvent>,
        refuse: bool,
    }

    #[async_trait]
    impl Agent for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn stream(&self, _request: AgentRequest) -> anyhow::Result<AgentEventStream> {
            if self.refuse {
                anyhow::bail!("connection refused");
            }
            Ok(stream::iter(self.events.clone().into_iter().map(Ok)).boxed())
        }
    }

    fn request() -> AgentRequest {
        AgentRequest {
            prompt: "hi".into(),
            deps: ToolDeps {
                workspace_root: std::env::temp_dir(),
                limits: SandboxLimits::default(),
            },
            history: Vec::new(),
        }
    }

    fn start(id: &str, name: &str, args: Value) -> AgentEvent {
        AgentEvent::ToolStart {
            call_id: id.into(),
            tool_name: name.into(),
            args,
        }
    }

    fn end(id: &str, result: Value) -> AgentEvent {
        AgentEvent::ToolEnd {
            call_id: id.into(),
            result,
        }
    }

    async fn collect(events: Vec<anyhow::Result<AgentEvent>>) -> Vec<TurnEvent> {
        translate(stream::iter(events).boxed()).collect().await
    }

    #[test]
    fn normalize_args_variants() {
        assert_eq!(
            normalize_args(json!({"path": "a.txt"})),
            json!({"path": "a.txt"}).as_object().cloned().unwrap()
        );
        assert_eq!(
            normalize_args(json!("{\"command\": \"ls\"}")),
            json!({"command": "ls"}).as_object().cloned().unwrap()
        );
        assert!(normalize_args(json!("")).is_empty());
        assert!(normalize_args(Value::Null).is_empty());
        assert_eq!(
            normalize_args(json!("not json")),
            json!({"input": "not json"}).as_object().cloned().unwrap()
        );
        assert_eq!(
            normalize_args(json!([1, 2])),
            json!({"input": [1, 2]}).as_object().cloned().unwrap()
        );
    }

    #[test]
    fn normalize_args_keeps_key_order() {
        let args = normalize_args(json!("{\"z\": 1, \"a\": 2, \"m\": 3}"));
        let keys: Vec<&str> = args.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[tokio::test]
    async fn paired_tool_events_are_correlated() {
        let raw = vec![
            Ok(AgentEvent::TextDelta("Looking".into())),
            Ok(start("c1", "ls", json!("{}"))),
            Ok(start("c2", "read_file", json!({"path": "a.txt"}))),
            Ok(end("c2", json!("contents"))),
            Ok(end("c1", json!(["a.txt"]))),
            Ok(AgentEvent::TextDelta(" done".into())),
        ];
        let events = collect(raw).await;
        assert_eq!(events.len(), 7);

        let mut started = Vec::new();
        for event in &events {
            match event {
                TurnEvent::ToolStart(s) => started.push(s.tool_call_id.clone()),
                TurnEvent::ToolEnd(e) => assert!(started.contains(&e.tool_call_id)),
                _ => {}
            }
        }
        assert_eq!(started, vec!["c1", "c2"]);

        let Some(TurnEvent::Result(result)) = events.last() else {
            panic!("last event must be the result");
        };
        assert_eq!(result.response, "Looking done");
        assert!(result.error.is_none());
        assert_eq!(result.tool_calls.len(), 2);
        assert_eq!(result.tool_calls[0].name, "ls");
        assert_eq!(result.tool_calls[0].result.as_deref(), Some("[\"a.txt\"]"));
        assert_eq!(result.tool_calls[1].result.as_deref(), Some("contents"));
    }

    #[tokio::test]
    async fn final_output_overrides_deltas() {
        let raw = vec![
            Ok(AgentEvent::TextDelta("partial".into())),
            Ok(AgentEvent::Final {
                output: Some("complete answer".into()),
            }),
        ];
        let events = collect(raw).await;
        assert_eq!(
            events.last(),
            Some(&TurnEvent::Result(AgentResult {
                response: "complete answer".into(),
                tool_calls: vec![],
                error: None,
            }))
        );
    }

    #[tokio::test]
    async fn empty_final_output_keeps_deltas() {
        let raw = vec![
            Ok(AgentEvent::TextDelta("kept".into())),
            Ok(AgentEvent::Final {
                output: Some(String::new()),
            }),
        ];
        let Some(TurnEvent::Result(result)) = collect(raw).await.pop() else {
            panic!("missing result");
        };
        assert_eq!(result.response, "kept");
    }

    #[tokio::test]
    async fn fault_ends_turn_without_retracting_deltas() {
        let raw = vec![
            Ok(AgentEvent::TextDelta("half".into())),
            Ok(start("c1", "bash", json!({"command": "ls"}))),
            Err(anyhow::anyhow!("stream reset")),
            Ok(AgentEvent::TextDelta("never seen".into())),
        ];
        let events = collect(raw).await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], TurnEvent::TextDelta("half".into()));
        let TurnEvent::Result(result) = &events[2] else {
            panic!("expected result");
        };
        assert_eq!(result.response, "");
        assert_eq!(result.error.as_deref(), Some("stream reset"));
        assert_eq!(result.tool_calls.len(), 1);
    }

    #[tokio::test]
    async fn agent_fault_event_is_turn_error() {
        let events = collect(vec![Ok(AgentEvent::Fault("rate limited".into()))]).await;
        assert_eq!(
            events,
            vec![TurnEvent::Result(AgentResult::failed("rate limited"))]
        );
    }

    #[tokio::test]
    async fn unknown_and_duplicate_ids_are_malformed() {
        let events = collect(vec![Ok(end("ghost", json!("x")))]).await;
        let TurnEvent::Result(result) = &events[0] else {
            panic!("expected result");
        };
        assert!(result.error.as_deref().unwrap().contains("unknown call id 'ghost'"));

        let events = collect(vec![
            Ok(start("c1", "ls", json!({}))),
            Ok(start("c1", "ls", json!({}))),
        ])
        .await;
        let Some(TurnEvent::Result(result)) = events.last() else {
            panic!("expected result");
        };
        assert!(result.error.as_deref().unwrap().contains("duplicate"));
    }

    #[tokio::test]
    async fn refused_agent_call_yields_single_error() {
        let agent = Scripted {
            events: vec![],
            refuse: true,
        };
        let events: Vec<TurnEvent> = stream_turn(&agent, request()).await.collect().await;
        assert_eq!(
            events,
            vec![TurnEvent::Result(AgentResult::failed("connection refused"))]
        );
    }

    #[tokio::test]
    async fn run_turn_matches_streaming_result() {
        let agent = Scripted {
            events: vec![
                start("c1", "glob", json!("{\"pattern\": \"*.rs\"}")),
                end("c1", json!("main.rs")),
                AgentEvent::Final {
                    output: Some("Found one file.".into()),
                },
            ],
            refuse: false,
        };
        let streamed: Vec<TurnEvent> = stream_turn(&agent, request()).await.collect().await;
        let blocking = run_turn(&agent, request()).await;

        assert_eq!(streamed.last(), Some(&TurnEvent::Result(blocking.clone())));
        assert_eq!(blocking.response, "Found one file.");
        assert_eq!(blocking.tool_calls[0].args["pattern"], "*.rs");
        assert_eq!(blocking.tool_calls[0].result.as_deref(), Some("main.rs"));
    }
}
