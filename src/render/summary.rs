//! Per-tool icons and one-line summaries.

use crate::agent::ToolArgs;
use crate::tools::{
    TOOL_BASH, TOOL_EDIT_FILE, TOOL_GLOB, TOOL_GREP, TOOL_LS, TOOL_READ_FILE, TOOL_WRITE_FILE,
};

pub const SPINNER_FRAMES: [&str; 4] = ["...", ".. ", ".  ", ".. "];

const COMMAND_WIDTH: usize = 40;
const OUTPUT_WIDTH: usize = 30;
const OUTPUT_EXCERPT: usize = 27;

pub fn icon(tool_name: &str) -> &'static str {
    match tool_name {
        TOOL_BASH => "$",
        TOOL_READ_FILE => "->",
        TOOL_WRITE_FILE => "<-",
        TOOL_EDIT_FILE => "~",
        TOOL_LS => "#",
        TOOL_GLOB => "*",
        TOOL_GREP => "?",
        _ => ">",
    }
}

pub fn spinner_frame(phase: usize) -> &'static str {
    SPINNER_FRAMES[phase % SPINNER_FRAMES.len()]
}

/// Short description of a call's arguments.
pub fn args_summary(tool_name: &str, args: &ToolArgs) -> String {
    let key = match tool_name {
        TOOL_BASH => "command",
        TOOL_READ_FILE | TOOL_WRITE_FILE | TOOL_EDIT_FILE | TOOL_LS => "path",
        TOOL_GLOB | TOOL_GREP => "pattern",
        _ => return String::new(),
    };
    let Some(value) = args.get(key).and_then(|value| value.as_str()) else {
        return String::new();
    };
    if tool_name == TOOL_BASH {
        truncate(value, COMMAND_WIDTH, COMMAND_WIDTH)
    } else {
        value.to_string()
    }
}

/// Short description of a call's result. Empty when there is nothing to say.
pub fn result_summary(tool_name: &str, result: &str) -> String {
    if result.is_empty() {
        return String::new();
    }
    match tool_name {
        TOOL_LS => {
            let items = result.trim().lines().filter(|line| !line.is_empty()).count();
            format!("{items} items")
        }
        TOOL_READ_FILE | TOOL_GLOB | TOOL_GREP => {
            let lines = result.trim().split('\n').count();
            format!("{lines} lines")
        }
        TOOL_WRITE_FILE | TOOL_EDIT_FILE => "done".to_string(),
        TOOL_BASH => {
            if result.chars().count() > OUTPUT_WIDTH {
                truncate(result, OUTPUT_WIDTH, OUTPUT_EXCERPT)
            } else {
                let trimmed = result.trim();
                if trimmed.is_empty() {
                    "done".to_string()
                } else {
                    trimmed.to_string()
                }
            }
        }
        _ => String::new(),
    }
}

/// Cut `text` to `keep` chars plus an ellipsis once it exceeds `limit` chars.
fn truncate(text: &str, limit: usize, keep: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(keep).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
