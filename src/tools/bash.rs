//! `bash` tool: run a shell command in the workspace root.

use crate::sandbox::Sandbox;
use crate::tools::traits::{required_str, Tool, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct BashTool {
    sandbox: Arc<Sandbox>,
}

impl BashTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        super::TOOL_BASH
    }

    fn description(&self) -> &str {
        "Run a shell command with the workspace root as working directory. \
         Returns stdout, a STDERR section when present, and the return code when non-zero. \
         Commands are killed after 30 seconds."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute (e.g. 'ls -la', 'cargo test')"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let command = match required_str(&args, "command") {
            Ok(command) => command,
            Err(missing) => return Ok(missing),
        };

        if command.trim().is_empty() {
            return Ok(ToolResult::failed("command cannot be empty"));
        }

        let output = self.sandbox.execute(command).await;
        Ok(ToolResult::from_sandbox(output))
    }
}
