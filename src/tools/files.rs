//! File tools: read_file, write_file, edit_file, ls.

use crate::sandbox::Sandbox;
use crate::tools::traits::{required_str, Tool, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

// ── read_file ─────────────────────────────────────────────────────────────────────

pub struct ReadFileTool {
    sandbox: Arc<Sandbox>,
}

impl ReadFileTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        super::TOOL_READ_FILE
    }

    fn description(&self) -> &str {
        "Read the contents of a file in the workspace. \
         Paths are relative to the workspace root."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to read, relative to the workspace root"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let path = match required_str(&args, "path") {
            Ok(path) => path,
            Err(missing) => return Ok(missing),
        };
        Ok(ToolResult::from_sandbox(self.sandbox.read(path)?))
    }
}

// ── write_file ────────────────────────────────────────────────────────────────────

pub struct WriteFileTool {
    sandbox: Arc<Sandbox>,
}

impl WriteFileTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        super::TOOL_WRITE_FILE
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it and any parent directories. \
         Overwrites the file if it already exists."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to write, relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let path = match required_str(&args, "path") {
            Ok(path) => path,
            Err(missing) => return Ok(missing),
        };
        let content = match required_str(&args, "content") {
            Ok(content) => content,
            Err(missing) => return Ok(missing),
        };
        Ok(ToolResult::from_sandbox(self.sandbox.write(path, content)?))
    }
}

// ── edit_file ─────────────────────────────────────────────────────────────────────

pub struct EditFileTool {
    sandbox: Arc<Sandbox>,
}

impl EditFileTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        super::TOOL_EDIT_FILE
    }

    fn description(&self) -> &str {
        "Replace an exact string in a file with new content. \
         Every occurrence of `old` is replaced and the count is reported."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to edit, relative to the workspace root"
                },
                "old": {
                    "type": "string",
                    "description": "Exact text to find (must occur at least once)"
                },
                "new": {
                    "type": "string",
                    "description": "Replacement text"
                }
            },
            "required": ["path", "old", "new"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let path = match required_str(&args, "path") {
            Ok(path) => path,
            Err(missing) => return Ok(missing),
        };
        let old = match required_str(&args, "old") {
            Ok(old) => old,
            Err(missing) => return Ok(missing),
        };
        let new = match required_str(&args, "new") {
            Ok(new) => new,
            Err(missing) => return Ok(missing),
        };
        Ok(ToolResult::from_sandbox(self.sandbox.edit(path, old, new)?))
    }
}

// ── ls ────────────────────────────────────────────────────────────────────────────

pub struct ListDirTool {
    sandbox: Arc<Sandbox>,
}

impl ListDirTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        super::TOOL_LS
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Directories are suffixed with '/'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list, relative to the workspace root. Default: '.'"
                }
            }
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let path = args["path"].as_str().unwrap_or(".");
        Ok(ToolResult::from_sandbox(self.sandbox.list(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{SandboxError, SandboxLimits};
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, Arc<Sandbox>) {
        let tmp = TempDir::new().unwrap();
        let sandbox = Sandbox::new(tmp.path(), SandboxLimits::default()).unwrap();
        (tmp, Arc::new(sandbox))
    }

    #[tokio::test]
    async fn write_then_read_through_tools() {
        let (_tmp, sb) = sandbox();
        let write = WriteFileTool::new(sb.clone())
            .execute(json!({"path": "notes.txt", "content": "v1"}))
            .await
            .unwrap();
        assert!(write.success);
        assert_eq!(write.output, "Successfully wrote 2 bytes to notes.txt");

        let read = ReadFileTool::new(sb)
            .execute(json!({"path": "notes.txt"}))
            .await
            .unwrap();
        assert_eq!(read, ToolResult::ok("v1"));
    }

    #[tokio::test]
    async fn missing_parameter_is_soft_failure() {
        let (_tmp, sb) = sandbox();
        let result = EditFileTool::new(sb)
            .execute(json!({"path": "a.txt", "old": "x"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.output, "Error: Missing required parameter: new");
    }

    #[tokio::test]
    async fn not_found_is_flagged_unsuccessful() {
        let (_tmp, sb) = sandbox();
        let result = ReadFileTool::new(sb)
            .execute(json!({"path": "missing.txt"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.output, "Error: File not found: missing.txt");
    }

    #[tokio::test]
    async fn file_content_starting_with_error_text_succeeds() {
        let (_tmp, sb) = sandbox();
        sb.write("build.log", "Error: linker failed\n").unwrap();
        let result = ReadFileTool::new(sb)
            .execute(json!({"path": "build.log"}))
            .await
            .unwrap();
        assert_eq!(result, ToolResult::ok("Error: linker failed\n"));
    }

    #[tokio::test]
    async fn ls_defaults_to_root() {
        let (_tmp, sb) = sandbox();
        let result = ListDirTool::new(sb).execute(json!({})).await.unwrap();
        assert_eq!(result, ToolResult::ok("(empty directory)"));
    }

    #[tokio::test]
    async fn escape_is_a_hard_error() {
        let (_tmp, sb) = sandbox();
        let err = ReadFileTool::new(sb)
            .execute(json!({"path": "../etc/passwd"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SandboxError>(),
            Some(SandboxError::PathEscape { .. })
        ));
    }
}
