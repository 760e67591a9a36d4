//! Search tools: glob, grep.

use crate::sandbox::Sandbox;
use crate::tools::traits::{required_str, Tool, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

// ── glob ──────────────────────────────────────────────────────────────────────────

pub struct GlobTool {
    sandbox: Arc<Sandbox>,
}

impl GlobTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        super::TOOL_GLOB
    }

    fn description(&self) -> &str {
        "Find files in the workspace matching a glob pattern (e.g. '**/*.rs', 'src/*.toml'). \
         Returns sorted workspace-relative paths."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern, relative to the workspace root"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let pattern = match required_str(&args, "pattern") {
            Ok(pattern) => pattern,
            Err(missing) => return Ok(missing),
        };
        Ok(ToolResult::from_sandbox(self.sandbox.glob(pattern)?))
    }
}

// ── grep ──────────────────────────────────────────────────────────────────────────

pub struct GrepTool {
    sandbox: Arc<Sandbox>,
}

impl GrepTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        super::TOOL_GREP
    }

    fn description(&self) -> &str {
        "Search file contents with a regular expression. \
         Returns 'path:line: text' for each match, at most 100 results."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search in. Default: '.'"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let pattern = match required_str(&args, "pattern") {
            Ok(pattern) => pattern,
            Err(missing) => return Ok(missing),
        };
        let path = args["path"].as_str().unwrap_or(".");
        Ok(ToolResult::from_sandbox(self.sandbox.search(pattern, path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxLimits;
    use tempfile::TempDir;

    #[tokio::test]
    async fn grep_tool_finds_line() {
        let tmp = TempDir::new().unwrap();
        let sb = Arc::new(Sandbox::new(tmp.path(), SandboxLimits::default()).unwrap());
        sb.write("search.txt", "line one\nline two\nline three").unwrap();

        let result = GrepTool::new(sb)
            .execute(json!({"pattern": "two", "path": "search.txt"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("search.txt:2: line two"));
        assert_eq!(result.output.lines().count(), 1);
    }

    #[tokio::test]
    async fn glob_tool_reports_no_matches() {
        let tmp = TempDir::new().unwrap();
        let sb = Arc::new(Sandbox::new(tmp.path(), SandboxLimits::default()).unwrap());
        let result = GlobTool::new(sb)
            .execute(json!({"pattern": "*.nothing"}))
            .await
            .unwrap();
        assert_eq!(result.output, "No files matching: *.nothing");
    }
}
