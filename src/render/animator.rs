//! Actor wrapper around [`RenderEngine`].
//!
//! Tool events and spinner ticks reach the engine through one queue, so the
//! turn driver and the ticker never touch renderer state concurrently. The
//! ticker runs only while at least one tool is active.

use std::io;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{RenderEngine, RenderStats, Screen};
use crate::agent::{ToolEndEvent, ToolStartEvent};

enum Command {
    Start(ToolStartEvent),
    End(ToolEndEvent),
    Tick,
    Finalize(oneshot::Sender<io::Result<RenderStats>>),
}

/// Handle to a running renderer for one turn.
pub struct RenderHandle {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl RenderHandle {
    pub fn spawn<S: Screen>(screen: S, interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let ticks = tx.downgrade();
        let task = tokio::spawn(run(RenderEngine::new(screen), rx, ticks, interval));
        Self { tx, task }
    }

    pub fn start_tool(&self, event: ToolStartEvent) {
        self.send(Command::Start(event));
    }

    pub fn end_tool(&self, event: ToolEndEvent) {
        self.send(Command::End(event));
    }

    /// Request one extra animation frame outside the ticker's schedule.
    pub fn tick(&self) {
        self.send(Command::Tick);
    }

    /// Stop the ticker, commit what ended and tear the actor down.
    pub async fn finalize(self) -> io::Result<RenderStats> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Finalize(reply));
        let stats = response
            .await
            .map_err(|_| io::Error::other("renderer stopped before finalize"))?;
        if let Err(err) = self.task.await {
            warn!(error = %err, "renderer task failed");
        }
        stats
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            debug!("renderer already stopped");
        }
    }
}

async fn run<S: Screen>(
    mut engine: RenderEngine<S>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    ticks: mpsc::WeakUnboundedSender<Command>,
    interval: Duration,
) {
    let mut ticker: Option<CancellationToken> = None;

    while let Some(command) = rx.recv().await {
        let outcome = match command {
            Command::Start(event) => {
                if ticker.is_none() {
                    ticker = Some(spawn_ticker(ticks.clone(), interval));
                }
                engine.start_tool(event)
            }
            Command::End(event) => {
                let outcome = engine.end_tool(event);
                if !engine.has_active() {
                    if let Some(token) = ticker.take() {
                        token.cancel();
                    }
                }
                outcome
            }
            Command::Tick => engine.tick(),
            Command::Finalize(reply) => {
                if let Some(token) = ticker.take() {
                    token.cancel();
                }
                let _ = reply.send(engine.finalize());
                return;
            }
        };
        if let Err(err) = outcome {
            warn!(error = %err, "render pass failed");
        }
    }

    // Handle dropped without finalize.
    if let Some(token) = ticker.take() {
        token.cancel();
    }
}

fn spawn_ticker(ticks: mpsc::WeakUnboundedSender<Command>, period: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let cancelled = token.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = cancelled.cancelled() => break,
                _ = interval.tick() => {
                    let Some(tx) = ticks.upgrade() else { break };
                    if tx.send(Command::Tick).is_err() {
                        break;
                    }
                }
            }
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MemoryScreen;
    use serde_json::json;

    const INTERVAL: Duration = Duration::from_millis(150);

    fn start(id: &str) -> ToolStartEvent {
        ToolStartEvent {
            tool_call_id: id.into(),
            tool_name: "bash".into(),
            args: json!({"command": "sleep 1"}).as_object().cloned().unwrap(),
        }
    }

    fn end(id: &str) -> ToolEndEvent {
        ToolEndEvent {
            tool_call_id: id.into(),
            result: "ok".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_animates_active_tools() {
        let screen = MemoryScreen::new();
        let handle = RenderHandle::spawn(screen.clone(), INTERVAL);

        handle.start_tool(start("c1"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.end_tool(end("c1"));

        let stats = handle.finalize().await.unwrap();
        assert_eq!(stats.committed_lines, 1);
        assert!(stats.ticks >= 2, "ticks: {}", stats.ticks);
        assert_eq!(screen.lines(), vec!["  + $ sleep 1 -> ok"]);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_stops_when_nothing_is_active() {
        let screen = MemoryScreen::new();
        let handle = RenderHandle::spawn(screen.clone(), INTERVAL);

        handle.start_tool(start("c1"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.end_tool(end("c1"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let presents = screen.presents();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(screen.presents(), presents);

        // A later start brings the spinner back.
        handle.start_tool(start("c2"));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(screen.presents() > presents + 1);

        let stats = handle.finalize().await.unwrap();
        assert_eq!(stats.committed_lines, 1);
        assert_eq!(screen.lines(), vec!["  + $ sleep 1 -> ok"]);
    }

    #[tokio::test]
    async fn finalize_without_tools_is_empty() {
        let screen = MemoryScreen::new();
        let handle = RenderHandle::spawn(screen.clone(), INTERVAL);
        handle.tick();
        let stats = handle.finalize().await.unwrap();
        assert_eq!(stats, RenderStats::default());
        assert!(screen.lines().is_empty());
    }
}
