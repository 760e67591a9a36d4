//! Path resolution against the workspace root.

use std::path::{Component, Path, PathBuf};

use super::SandboxError;

/// Resolve `requested` relative to `root` and require the result to stay
/// inside it.
///
/// `root` must already be canonical. Components are applied one at a time:
/// `..` pops, and every prefix that exists on disk is canonicalised so a
/// symlink is followed to wherever it really points. Components that do not
/// exist yet (a file about to be written) are appended lexically. The final
/// containment check is component-wise, so `/ws2` is never mistaken for a
/// child of `/ws`.
pub fn resolve_within(root: &Path, requested: &str) -> Result<PathBuf, SandboxError> {
    let escape = || SandboxError::PathEscape {
        path: requested.to_string(),
    };

    let joined = root.join(requested);
    let mut resolved = PathBuf::new();

    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => {
                resolved.push(part);
                if std::fs::symlink_metadata(&resolved).is_ok() {
                    // Dangling symlinks fail to canonicalise; their target is
                    // unknowable, so treat them as escaping.
                    resolved = std::fs::canonicalize(&resolved).map_err(|_| escape())?;
                }
            }
        }
    }

    if resolved.starts_with(root) {
        Ok(resolved)
    } else {
        tracing::warn!(path = requested, "rejected path outside workspace");
        Err(escape())
    }
}
