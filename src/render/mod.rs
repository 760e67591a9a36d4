//! Live tool activity rendering.
//!
//! A tool call is drawn as a spinner line while it runs and committed as a
//! permanent line once it ends. Each render pass erases exactly the spinner
//! lines the previous pass printed, prints new commits in FIFO order and
//! redraws the still-active calls. [`RenderEngine`] holds that state for one
//! turn; [`RenderHandle`] runs it as an actor next to its spinner ticker.

pub mod animator;
pub mod screen;
pub mod summary;

pub use animator::RenderHandle;
pub use screen::{MemoryScreen, Screen};

use console::style;
use std::collections::VecDeque;
use std::io;
use tracing::debug;

use crate::agent::{ToolArgs, ToolEndEvent, ToolStartEvent};

/// Display state of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDisplay {
    pub tool_call_id: String,
    pub tool_name: String,
    pub args: ToolArgs,
    pub result: Option<String>,
    pub spinner_phase: usize,
}

impl ToolDisplay {
    fn started(event: ToolStartEvent) -> Self {
        Self {
            tool_call_id: event.tool_call_id,
            tool_name: event.tool_name,
            args: event.args,
            result: None,
            spinner_phase: 0,
        }
    }

    fn active_line(&self) -> String {
        format!(
            "  {} {} {}",
            style(summary::spinner_frame(self.spinner_phase)).yellow(),
            summary::icon(&self.tool_name),
            summary::args_summary(&self.tool_name, &self.args)
        )
    }

    fn committed_line(&self) -> String {
        let mut line = format!(
            "  {} {} {}",
            style("+").green(),
            summary::icon(&self.tool_name),
            summary::args_summary(&self.tool_name, &self.args)
        );
        let result = summary::result_summary(&self.tool_name, self.result.as_deref().unwrap_or(""));
        if !result.is_empty() {
            line.push_str(&format!(" {}", style(format!("-> {result}")).dim()));
        }
        line
    }
}

/// Totals for one rendered turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub committed_lines: usize,
    pub ticks: usize,
}

/// Per-turn renderer state over a [`Screen`].
pub struct RenderEngine<S: Screen> {
    screen: S,
    /// Running calls, in start order.
    active: Vec<ToolDisplay>,
    /// Ended calls waiting for the next pass to commit them.
    pending: VecDeque<ToolDisplay>,
    /// Spinner lines printed by the previous pass.
    last_line_count: usize,
    stats: RenderStats,
}

impl<S: Screen> RenderEngine<S> {
    pub fn new(screen: S) -> Self {
        Self {
            screen,
            active: Vec::new(),
            pending: VecDeque::new(),
            last_line_count: 0,
            stats: RenderStats::default(),
        }
    }

    pub fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Spinner lines currently on screen.
    pub fn line_count(&self) -> usize {
        self.last_line_count
    }

    pub fn start_tool(&mut self, event: ToolStartEvent) -> io::Result<()> {
        self.active.push(ToolDisplay::started(event));
        self.render()
    }

    /// Move a call from active to pending. Unknown ids are ignored.
    pub fn end_tool(&mut self, event: ToolEndEvent) -> io::Result<()> {
        let Some(index) = self
            .active
            .iter()
            .position(|tool| tool.tool_call_id == event.tool_call_id)
        else {
            debug!(call_id = %event.tool_call_id, "end for a tool that is not active");
            return Ok(());
        };
        let mut tool = self.active.remove(index);
        tool.result = Some(event.result);
        self.pending.push_back(tool);
        self.render()
    }

    /// Advance every spinner one frame and redraw.
    pub fn tick(&mut self) -> io::Result<()> {
        if self.active.is_empty() {
            return Ok(());
        }
        for tool in &mut self.active {
            tool.spinner_phase += 1;
        }
        self.stats.ticks += 1;
        self.render()
    }

    pub fn render(&mut self) -> io::Result<()> {
        self.screen.erase_lines(self.last_line_count)?;
        self.last_line_count = 0;
        self.flush_pending()?;
        for tool in &self.active {
            self.screen.print_line(&tool.active_line())?;
            self.last_line_count += 1;
        }
        self.screen.present()
    }

    /// End the turn: drop spinner lines, commit what ended and reset.
    pub fn finalize(&mut self) -> io::Result<RenderStats> {
        self.screen.erase_lines(self.last_line_count)?;
        self.last_line_count = 0;
        self.flush_pending()?;
        if !self.active.is_empty() {
            debug!(count = self.active.len(), "discarding tools that never ended");
        }
        self.active.clear();
        self.screen.present()?;
        Ok(std::mem::take(&mut self.stats))
    }

    fn flush_pending(&mut self) -> io::Result<()> {
        while let Some(tool) = self.pending.pop_front() {
            self.screen.print_line(&tool.committed_line())?;
            self.stats.committed_lines += 1;
        }
        Ok(())
    }
}
