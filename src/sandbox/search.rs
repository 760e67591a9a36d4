//! Glob and regex search over the workspace.

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use super::{soft_error, Sandbox, SandboxOutput};

/// Sorted workspace-relative files matching `pattern`.
///
/// The pattern is anchored at the workspace root. Matches that resolve
/// outside the root (through `..` or a symlink) are dropped.
pub(crate) fn glob_files(sandbox: &Sandbox, pattern: &str) -> SandboxOutput {
    let no_matches = || SandboxOutput::ok(format!("No files matching: {pattern}"));

    if Path::new(pattern).is_absolute() {
        return no_matches();
    }

    let anchored = format!(
        "{}/{}",
        glob::Pattern::escape(&sandbox.root().to_string_lossy()),
        pattern
    );
    let paths = match glob::glob(&anchored) {
        Ok(paths) => paths,
        Err(e) => return soft_error(format!("Invalid glob pattern: {e}")),
    };

    let mut matches: Vec<String> = paths
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .filter_map(|p| std::fs::canonicalize(&p).ok())
        .filter(|p| p.starts_with(sandbox.root()))
        .map(|p| sandbox.relative(&p).to_string_lossy().into_owned())
        .collect();
    matches.sort();
    matches.dedup();

    if matches.is_empty() {
        return no_matches();
    }
    matches.join("\n").into()
}

/// `path:line: text` for every line matching `pattern`, capped at the
/// sandbox's result limit. Unreadable and non-UTF-8 files are skipped.
pub(crate) fn grep(
    sandbox: &Sandbox,
    pattern: &str,
    display_path: &str,
    resolved: &Path,
) -> SandboxOutput {
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(e) => return soft_error(format!("Invalid regex pattern: {e}")),
    };

    let files: Vec<PathBuf> = if resolved.is_file() {
        vec![resolved.to_path_buf()]
    } else if resolved.is_dir() {
        WalkDir::new(resolved)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .collect()
    } else {
        return soft_error(format!("Path not found: {display_path}"));
    };

    let limit = sandbox.limits().max_search_results;
    let mut results = Vec::new();

    'files: for file in &files {
        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(file = %file.display(), "skipping unreadable file: {e}");
                continue;
            }
        };
        let rel = sandbox.relative(file).display().to_string();
        for (idx, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                results.push(format!("{rel}:{}: {line}", idx + 1));
                if results.len() >= limit {
                    break 'files;
                }
            }
        }
    }

    if results.is_empty() {
        return SandboxOutput::ok(format!("No matches for pattern: {pattern}"));
    }
    results.join("\n").into()
}
