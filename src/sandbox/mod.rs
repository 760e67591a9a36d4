//! Workspace sandbox for agent tools.
//!
//! A [`Sandbox`] is bound to one canonical workspace root. Every path handed
//! in by the agent is resolved against that root (symlinks and `..` included)
//! and must land on the root or beneath it. A path that escapes is the only
//! hard failure: it comes back as [`SandboxError::PathEscape`]. Everything
//! else (missing files, bad patterns, failing commands) is reported as a
//! failed [`SandboxOutput`] whose text the model can read and adapt to.

pub mod command;
pub mod path;
pub mod search;

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use command::CommandOutput;

/// Prefix carried by every fail-soft result string.
pub const ERROR_PREFIX: &str = "Error: ";

/// Hard sandbox failures.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Path {path} escapes workspace boundary")]
    PathEscape { path: String },

    #[error("workspace root {} is unusable: {source}", path.display())]
    WorkspaceRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Text produced by a sandbox operation, flagged when the operation failed
/// softly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxOutput {
    text: String,
    failed: bool,
}

impl SandboxOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            failed: false,
        }
    }

    /// A fail-soft outcome; the text carries [`ERROR_PREFIX`].
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self {
            text: format!("{ERROR_PREFIX}{message}"),
            failed: true,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl From<String> for SandboxOutput {
    fn from(text: String) -> Self {
        Self::ok(text)
    }
}

impl std::fmt::Display for SandboxOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq<&str> for SandboxOutput {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

pub type SandboxResult = Result<SandboxOutput, SandboxError>;

/// Bounds applied to the sandbox's long-running and large-output operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    /// Wall-clock limit for `execute`, in seconds.
    pub command_timeout_secs: u64,
    /// Maximum number of match lines returned by `search`.
    pub max_search_results: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
            max_search_results: 100,
        }
    }
}

impl SandboxLimits {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

pub(crate) fn soft_error(message: impl std::fmt::Display) -> SandboxOutput {
    SandboxOutput::failed(message)
}

/// Filesystem and shell primitives confined to a workspace root.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    limits: SandboxLimits,
}

impl Sandbox {
    /// Bind a sandbox to `root`, creating it if needed.
    pub fn new(root: &Path, limits: SandboxLimits) -> Result<Self, SandboxError> {
        let root_error = |source| SandboxError::WorkspaceRoot {
            path: root.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(root).map_err(root_error)?;
        let root = std::fs::canonicalize(root).map_err(root_error)?;
        Ok(Self { root, limits })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Resolve `path` against the workspace root, failing hard on escape.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, SandboxError> {
        path::resolve_within(&self.root, path)
    }

    /// Workspace-relative display form of an already resolved path.
    pub(crate) fn relative<'a>(&self, resolved: &'a Path) -> &'a Path {
        resolved.strip_prefix(&self.root).unwrap_or(resolved)
    }

    /// Read a file as text.
    pub fn read(&self, path: &str) -> SandboxResult {
        let resolved = self.resolve(path)?;
        if !resolved.exists() {
            return Ok(soft_error(format!("File not found: {path}")));
        }
        if !resolved.is_file() {
            return Ok(soft_error(format!("Not a file: {path}")));
        }
        Ok(match std::fs::read_to_string(&resolved) {
            Ok(content) => content.into(),
            Err(e) => soft_error(format!("Failed to read {path}: {e}")),
        })
    }

    /// Write `content` to `path`, creating parent directories.
    pub fn write(&self, path: &str, content: &str) -> SandboxResult {
        let resolved = self.resolve(path)?;
        // The temp file lands next to the target, so the root itself is off
        // limits: its parent is outside the workspace.
        if resolved == self.root || resolved.is_dir() {
            return Ok(soft_error(format!("Not a file: {path}")));
        }
        Ok(match replace_contents(&resolved, content) {
            Ok(()) => format!("Successfully wrote {} bytes to {path}", content.len()).into(),
            Err(e) => soft_error(format!("Failed to write {path}: {e}")),
        })
    }

    /// Replace every occurrence of `old` with `new` in `path`.
    pub fn edit(&self, path: &str, old: &str, new: &str) -> SandboxResult {
        let resolved = self.resolve(path)?;
        if !resolved.exists() {
            return Ok(soft_error(format!("File not found: {path}")));
        }
        if !resolved.is_file() {
            return Ok(soft_error(format!("Not a file: {path}")));
        }
        if old.is_empty() {
            return Ok(soft_error("String to replace must not be empty"));
        }
        let content = match std::fs::read_to_string(&resolved) {
            Ok(content) => content,
            Err(e) => return Ok(soft_error(format!("Failed to read {path}: {e}"))),
        };

        let count = content.matches(old).count();
        if count == 0 {
            return Ok(soft_error(format!("String not found in {path}")));
        }

        let updated = content.replace(old, new);
        Ok(match replace_contents(&resolved, &updated) {
            Ok(()) => format!("Replaced {count} occurrence(s) in {path}").into(),
            Err(e) => soft_error(format!("Failed to write {path}: {e}")),
        })
    }

    /// List a directory, sorted, with directories suffixed by `/`.
    pub fn list(&self, path: &str) -> SandboxResult {
        let resolved = self.resolve(path)?;
        if !resolved.exists() {
            return Ok(soft_error(format!("Directory not found: {path}")));
        }
        if !resolved.is_dir() {
            return Ok(soft_error(format!("Not a directory: {path}")));
        }

        let reader = match std::fs::read_dir(&resolved) {
            Ok(reader) => reader,
            Err(e) => return Ok(soft_error(format!("Failed to list {path}: {e}"))),
        };

        let mut entries: Vec<String> = reader
            .filter_map(Result::ok)
            .map(|entry| {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.path().is_dir() {
                    name.push('/');
                }
                name
            })
            .collect();
        entries.sort();

        if entries.is_empty() {
            return Ok(SandboxOutput::ok("(empty directory)"));
        }
        Ok(entries.join("\n").into())
    }

    /// Files under the workspace root matching a glob pattern.
    pub fn glob(&self, pattern: &str) -> SandboxResult {
        Ok(search::glob_files(self, pattern))
    }

    /// Regex search over a file or a directory tree.
    pub fn search(&self, pattern: &str, path: &str) -> SandboxResult {
        let resolved = self.resolve(path)?;
        Ok(search::grep(self, pattern, path, &resolved))
    }

    /// Run a shell command in the workspace root.
    pub async fn execute(&self, command: &str) -> SandboxOutput {
        command::run_in(&self.root, command, self.limits.command_timeout()).await
    }
}

/// Write through a sibling temp file and rename over the target, so readers
/// never observe a half-written file.
fn replace_contents(target: &Path, content: &str) -> std::io::Result<()> {
    let parent = target.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, Sandbox) {
        let tmp = TempDir::new().unwrap();
        let sandbox = Sandbox::new(tmp.path(), SandboxLimits::default()).unwrap();
        (tmp, sandbox)
    }

    #[test]
    fn escaping_paths_fail_hard() {
        let (_tmp, sb) = sandbox();
        for path in ["../x", "/etc/passwd", "a/../../b"] {
            assert!(
                matches!(sb.read(path), Err(SandboxError::PathEscape { .. })),
                "{path} should escape"
            );
            assert!(matches!(sb.write(path, "x"), Err(SandboxError::PathEscape { .. })));
            assert!(matches!(sb.list(path), Err(SandboxError::PathEscape { .. })));
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_tmp, sb) = sandbox();
        for content in ["", "v1", "multi\nline\n", "unicode ✓ ü"] {
            sb.write("notes.txt", content).unwrap();
            assert_eq!(sb.read("notes.txt").unwrap(), content);
        }
    }

    #[test]
    fn write_edit_read_scenario() {
        let (_tmp, sb) = sandbox();
        assert_eq!(
            sb.write("notes.txt", "v1").unwrap(),
            "Successfully wrote 2 bytes to notes.txt"
        );
        assert_eq!(sb.read("notes.txt").unwrap(), "v1");
        assert_eq!(
            sb.edit("notes.txt", "v1", "v2").unwrap(),
            "Replaced 1 occurrence(s) in notes.txt"
        );
        assert_eq!(sb.read("notes.txt").unwrap(), "v2");
    }

    #[test]
    fn write_creates_parent_directories() {
        let (tmp, sb) = sandbox();
        let out = sb.write("a/b/c/deep.txt", "Deep").unwrap();
        assert!(out.text().starts_with("Successfully wrote"));
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("a/b/c/deep.txt")).unwrap(),
            "Deep"
        );
    }

    #[test]
    fn read_reports_missing_and_directories() {
        let (tmp, sb) = sandbox();
        std::fs::create_dir(tmp.path().join("subdir")).unwrap();
        assert_eq!(sb.read("missing.txt").unwrap(), "Error: File not found: missing.txt");
        assert_eq!(sb.read("subdir").unwrap(), "Error: Not a file: subdir");
    }

    #[test]
    fn edit_replaces_every_occurrence() {
        let (_tmp, sb) = sandbox();
        sb.write("multi.txt", "foo bar foo baz foo").unwrap();
        assert_eq!(
            sb.edit("multi.txt", "foo", "qux").unwrap(),
            "Replaced 3 occurrence(s) in multi.txt"
        );
        assert_eq!(sb.read("multi.txt").unwrap(), "qux bar qux baz qux");
    }

    #[test]
    fn edit_without_match_leaves_file_untouched() {
        let (_tmp, sb) = sandbox();
        sb.write("nope.txt", "Hello").unwrap();
        assert_eq!(
            sb.edit("nope.txt", "Goodbye", "Hi").unwrap(),
            "Error: String not found in nope.txt"
        );
        assert_eq!(sb.read("nope.txt").unwrap(), "Hello");
        assert_eq!(
            sb.edit("missing.txt", "a", "b").unwrap(),
            "Error: File not found: missing.txt"
        );
    }

    #[test]
    fn list_sorts_and_marks_directories() {
        let (tmp, sb) = sandbox();
        assert_eq!(sb.list(".").unwrap(), "(empty directory)");

        std::fs::write(tmp.path().join("b.txt"), "").unwrap();
        std::fs::write(tmp.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(tmp.path().join("subdir")).unwrap();
        assert_eq!(sb.list(".").unwrap(), "a.txt\nb.txt\nsubdir/");

        assert_eq!(sb.list("missing").unwrap(), "Error: Directory not found: missing");
        assert_eq!(sb.list("a.txt").unwrap(), "Error: Not a directory: a.txt");
    }

    #[test]
    fn new_creates_missing_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("fresh").join("ws");
        let sb = Sandbox::new(&root, SandboxLimits::default()).unwrap();
        assert!(root.is_dir());
        assert_eq!(sb.root(), std::fs::canonicalize(&root).unwrap());
    }

    #[test]
    fn write_refuses_directories_and_the_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("ws");
        let sb = Sandbox::new(&root, SandboxLimits::default()).unwrap();
        std::fs::create_dir(root.join("subdir")).unwrap();
        let outside_before = std::fs::read_dir(tmp.path()).unwrap().count();

        for path in [".", "", "subdir", "subdir/.."] {
            let out = sb.write(path, "x").unwrap();
            assert!(out.is_failed(), "{path}: {out}");
            assert_eq!(out.text(), format!("Error: Not a file: {path}"));
        }
        assert_eq!(sb.edit(".", "a", "b").unwrap(), "Error: Not a file: .");

        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), outside_before);
        assert_eq!(sb.list(".").unwrap(), "subdir/");
        assert!(root.join("subdir").is_dir());
    }

    #[test]
    fn content_that_looks_like_an_error_is_still_a_success() {
        let (_tmp, sb) = sandbox();
        sb.write("log.txt", "Error: disk full").unwrap();
        let out = sb.read("log.txt").unwrap();
        assert!(!out.is_failed());
        assert_eq!(out, "Error: disk full");

        assert!(sb.read("missing.txt").unwrap().is_failed());
    }
}
