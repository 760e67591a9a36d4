//! The fixed tool set advertised to the agent.
//!
//! Seven workspace tools, all thin delegators to one shared [`Sandbox`]:
//! `bash`, `read_file`, `write_file`, `edit_file`, `ls`, `glob`, `grep`.

pub mod bash;
pub mod files;
pub mod search;
pub mod traits;

pub use bash::BashTool;
pub use files::{EditFileTool, ListDirTool, ReadFileTool, WriteFileTool};
pub use search::{GlobTool, GrepTool};
pub use traits::{Tool, ToolResult, ToolSpec};

use crate::sandbox::Sandbox;
use std::sync::Arc;

/// Tool name constants for reference.
pub const TOOL_BASH: &str = "bash";
pub const TOOL_READ_FILE: &str = "read_file";
pub const TOOL_WRITE_FILE: &str = "write_file";
pub const TOOL_EDIT_FILE: &str = "edit_file";
pub const TOOL_LS: &str = "ls";
pub const TOOL_GLOB: &str = "glob";
pub const TOOL_GREP: &str = "grep";

/// Every tool name, in advertisement order.
pub const ALL_TOOL_NAMES: [&str; 7] = [
    TOOL_READ_FILE,
    TOOL_WRITE_FILE,
    TOOL_EDIT_FILE,
    TOOL_LS,
    TOOL_GLOB,
    TOOL_GREP,
    TOOL_BASH,
];

/// Named lookup over the workspace tools.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Build the full tool set over `sandbox`.
    pub fn for_sandbox(sandbox: Arc<Sandbox>) -> Self {
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(ReadFileTool::new(sandbox.clone())),
            Box::new(WriteFileTool::new(sandbox.clone())),
            Box::new(EditFileTool::new(sandbox.clone())),
            Box::new(ListDirTool::new(sandbox.clone())),
            Box::new(GlobTool::new(sandbox.clone())),
            Box::new(GrepTool::new(sandbox.clone())),
            Box::new(BashTool::new(sandbox)),
        ];
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|tool| tool.name() == name)
            .map(|tool| tool.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec()).collect()
    }

    /// Dispatch a call by name. Unknown names are a fail-soft result; only a
    /// sandbox boundary violation comes back as `Err`.
    pub async fn execute(&self, name: &str, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        match self.get(name) {
            Some(tool) => tool.execute(args).await,
            None => Ok(ToolResult::failed(format!("Unknown tool: {name}"))),
        }
    }
}
