//! Bounded shell command runner.
//!
//! Commands run through `sh -c` with the workspace root as working directory
//! and a hard wall-clock limit. The child is killed when the limit expires.
//! There is no allow-listing of command content.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::{soft_error, SandboxOutput};

/// Output captured from a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Agent-facing rendering: stdout, then a labelled stderr section, then
    /// the exit code when it is non-zero.
    pub fn render(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            out.push_str(&format!("\nSTDERR:\n{}", self.stderr));
        }
        if self.exit_code != 0 {
            out.push_str(&format!("\nReturn code: {}", self.exit_code));
        }
        if out.is_empty() {
            return "(no output)".to_string();
        }
        out
    }
}

/// Spawn `command` under `sh -c` in `workdir` and wait at most `timeout`.
pub async fn capture(workdir: &Path, command: &str, timeout: Duration) -> anyhow::Result<Option<CommandOutput>> {
    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| anyhow::anyhow!("Failed to spawn shell: {e}"))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Err(_elapsed) => Ok(None),
        Ok(output) => {
            let output = output.map_err(|e| anyhow::anyhow!("Failed to collect output: {e}"))?;
            Ok(Some(CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: exit_code(&output.status),
            }))
        }
    }
}

#[cfg(unix)]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Run `command` and always come back with agent-facing output. A non-zero
/// exit is still a completed run; only timeouts and spawn failures fail.
pub(crate) async fn run_in(workdir: &Path, command: &str, timeout: Duration) -> SandboxOutput {
    tracing::debug!(command, "executing shell command");
    match capture(workdir, command, timeout).await {
        Ok(Some(output)) => output.render().into(),
        Ok(None) => {
            tracing::warn!(command, timeout_secs = timeout.as_secs(), "command timed out");
            soft_error(format!(
                "Command timed out after {} seconds",
                timeout.as_secs()
            ))
        }
        Err(e) => soft_error(e),
    }
}
