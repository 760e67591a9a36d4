//! The turn loop: persist the prompt, stream the agent, render, persist the
//! answer.

use anyhow::{Context, Result};
use console::style;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::agent::{run_turn, stream_turn, Agent, AgentRequest, AgentResult, ToolDeps, TurnEvent};
use crate::render::{RenderHandle, Screen};
use crate::sandbox::SandboxLimits;
use crate::store::conversation::new_thread_id;
use crate::store::{ConversationStore, Message, Workspace};

const AGENT_PROMPT: &str = "Agent> ";

/// One conversation thread between the user and one agent.
pub struct Session<S: Screen + Clone> {
    workspace: Workspace,
    store: ConversationStore,
    agent: Arc<dyn Agent>,
    thread_id: String,
    limits: SandboxLimits,
    spinner_interval: Duration,
    screen: S,
}

impl<S: Screen + Clone> Session<S> {
    /// Bind to `thread_id`, or to a fresh thread when none is given.
    pub fn new(
        workspace: Workspace,
        agent: Arc<dyn Agent>,
        thread_id: Option<String>,
        limits: SandboxLimits,
        spinner_interval: Duration,
        screen: S,
    ) -> Self {
        let store = workspace.conversations();
        Self {
            workspace,
            store,
            agent,
            thread_id: thread_id.unwrap_or_else(new_thread_id),
            limits,
            spinner_interval,
            screen,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }

    /// Record the prompt and build the request from the history before it.
    fn begin(&self, prompt: &str) -> Result<AgentRequest> {
        self.store
            .append(&self.thread_id, &Message::user(prompt))
            .context("Failed to record user message")?;
        let mut history = self.store.load(&self.thread_id)?;
        history.pop();
        Ok(AgentRequest {
            prompt: prompt.to_string(),
            deps: ToolDeps {
                workspace_root: self.workspace.root().to_path_buf(),
                limits: self.limits,
            },
            history,
        })
    }

    fn finish(&self, result: &AgentResult) -> Result<()> {
        let message = Message::assistant(
            result.response.clone(),
            self.agent.name(),
            result.tool_calls.clone(),
        );
        self.store
            .append(&self.thread_id, &message)
            .context("Failed to record assistant message")?;
        info!(
            thread = %self.thread_id,
            tool_calls = result.tool_calls.len(),
            failed = result.is_error(),
            "turn finished"
        );
        Ok(())
    }

    /// Run one streamed turn, rendering text and tool activity as it arrives.
    pub async fn turn(&mut self, prompt: &str) -> Result<AgentResult> {
        let request = self.begin(prompt)?;
        self.screen.print_inline(AGENT_PROMPT)?;

        let mut events = stream_turn(self.agent.as_ref(), request).await;
        let mut display: Option<RenderHandle> = None;
        let mut open_tools = 0usize;
        let mut text_started = false;
        // Text streamed while a spinner is live waits until the tools settle.
        let mut held = String::new();
        let mut outcome = None;

        while let Some(event) = events.next().await {
            match event {
                TurnEvent::TextDelta(text) => {
                    held.push_str(&text);
                    if open_tools == 0 {
                        self.show_text(&mut display, &mut text_started, &held).await?;
                        held.clear();
                    }
                }
                TurnEvent::ToolStart(start) => {
                    if text_started {
                        self.screen.print_line("")?;
                        text_started = false;
                    }
                    open_tools += 1;
                    display
                        .get_or_insert_with(|| {
                            RenderHandle::spawn(self.screen.clone(), self.spinner_interval)
                        })
                        .start_tool(start);
                }
                TurnEvent::ToolEnd(end) => {
                    open_tools = open_tools.saturating_sub(1);
                    if let Some(handle) = &display {
                        handle.end_tool(end);
                    }
                    if open_tools == 0 && !held.is_empty() {
                        self.show_text(&mut display, &mut text_started, &held).await?;
                        held.clear();
                    }
                }
                TurnEvent::Result(result) => outcome = Some(result),
            }
        }

        if !held.is_empty() {
            self.show_text(&mut display, &mut text_started, &held).await?;
        }
        if let Some(handle) = display.take() {
            handle.finalize().await?;
        }
        self.screen.print_line("")?;

        let result =
            outcome.unwrap_or_else(|| AgentResult::failed("Agent stream ended without a result"));
        if let Some(error) = &result.error {
            self.screen
                .print_line(&style(format!("Error: {error}")).red().to_string())?;
        }
        self.screen.print_line("")?;
        self.screen.present()?;

        self.finish(&result)?;
        Ok(result)
    }

    /// Print response text, committing any finished tool lines first so the
    /// spinner never redraws over it.
    async fn show_text(
        &mut self,
        display: &mut Option<RenderHandle>,
        started: &mut bool,
        text: &str,
    ) -> Result<()> {
        if !*started {
            if let Some(handle) = display.take() {
                handle.finalize().await?;
                self.screen.print_inline(AGENT_PROMPT)?;
            }
        }
        *started = true;
        self.screen.print_inline(text)?;
        self.screen.present()?;
        Ok(())
    }

    /// Run one turn to completion without live rendering.
    pub async fn ask(&mut self, prompt: &str) -> Result<AgentResult> {
        let request = self.begin(prompt)?;
        let result = run_turn(self.agent.as_ref(), request).await;
        self.finish(&result)?;
        Ok(result)
    }
}
