use async_trait::async_trait;
use serde::Serialize;

use crate::sandbox::{SandboxOutput, ERROR_PREFIX};

/// Outcome of a tool call as the agent will see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            output: format!("{ERROR_PREFIX}{message}"),
        }
    }

    pub fn from_sandbox(output: SandboxOutput) -> Self {
        Self {
            success: !output.is_failed(),
            output: output.into_text(),
        }
    }
}

/// Advertised shape of a tool, as sent to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A named, schema-described capability the agent can invoke.
///
/// `execute` returns `Err` only for hard failures (a sandbox boundary
/// violation); every other outcome is an `Ok(ToolResult)`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

/// Pull a required string parameter, or produce the fail-soft result for it.
pub(crate) fn required_str<'a>(args: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolResult> {
    args[key]
        .as_str()
        .ok_or_else(|| ToolResult::failed(format!("Missing required parameter: {key}")))
}
