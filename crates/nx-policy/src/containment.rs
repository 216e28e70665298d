// containment.rs - Canonical path containment under a root directory.
//
// One algorithm, run independently by the Shield (against the policy root)
// and by every Sub-agent (against its own root):
//
//   1. Reject NUL bytes outright.
//   2. Join the candidate onto the canonical root and normalise `.` and `..`
//      lexically, so traversal can never climb through a component we never
//      looked at.
//   3. Canonicalise the deepest ancestor that exists (resolving any symlinks
//      on the way) and re-append the not-yet-existing tail.
//   4. Require the result to be a strict descendant of the canonical root.
//
// Why lexical normalisation comes first: `canonicalize` only works on paths
// that exist, and most dispatch targets do not exist yet. Collapsing `..`
// up front means the part we cannot canonicalise (the new file name and any
// missing directories) contains only plain names, so it cannot climb out.
// The part that does exist is canonicalised, which resolves any symlink an
// attacker may have planted inside the root: a link pointing outside makes
// the resolved path leave the root and the check fails.
//
// The comparison is component-wise (`Path::starts_with`), so `/srv/dispatch2`
// is not mistaken for a child of `/srv/dispatch`. The root itself is not a
// valid target, only strict descendants are.
//
// Only read-only metadata lookups happen here. Anything that cannot be
// resolved counts as a containment failure.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A path that has passed a containment check.
///
/// There is no public constructor other than [`resolve_within`], so holding
/// a `ValidatedPath` proves the check ran. The Executor only accepts this type.
/// It serializes for reports but never deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedPath {
    root: PathBuf,
    path: PathBuf,
}

impl ValidatedPath {
    /// The absolute, resolved path.
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// The canonical root this path was checked against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path relative to its root.
    pub fn relative(&self) -> &Path {
        // Construction guarantees `path` starts with `root`.
        self.path.strip_prefix(&self.root).unwrap_or(&self.path)
    }

    /// Number of components below the root (1 = direct child).
    pub fn depth(&self) -> usize {
        self.relative().components().count()
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }

    /// Lower-cased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
    }
}

/// Why a candidate path failed containment.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContainmentError {
    #[error("null byte in path '{candidate}'")]
    NullByte { candidate: String },

    #[error("path '{candidate}' resolves to {resolved}, outside root {root}")]
    Escapes {
        candidate: String,
        resolved: PathBuf,
        root: PathBuf,
    },

    #[error("path '{candidate}' resolves to the root directory itself")]
    IsRoot { candidate: String },

    #[error("path '{candidate}' cannot be resolved: {reason}")]
    Unresolvable { candidate: String, reason: String },
}

/// Resolve `candidate` against `root` and verify it stays strictly inside.
pub fn resolve_within(root: &Path, candidate: &str) -> Result<ValidatedPath, ContainmentError> {
    if candidate.contains('\0') {
        return Err(ContainmentError::NullByte {
            candidate: candidate.escape_default().to_string(),
        });
    }

    let unresolvable = |reason: String| ContainmentError::Unresolvable {
        candidate: candidate.to_string(),
        reason,
    };

    let canonical_root =
        fs::canonicalize(root).map_err(|e| unresolvable(format!("root {}: {e}", root.display())))?;

    let normalized = normalize_lexically(&canonical_root.join(candidate));
    let resolved = canonicalize_existing_prefix(&normalized).map_err(unresolvable)?;

    if resolved == canonical_root {
        return Err(ContainmentError::IsRoot {
            candidate: candidate.to_string(),
        });
    }
    if !resolved.starts_with(&canonical_root) {
        return Err(ContainmentError::Escapes {
            candidate: candidate.to_string(),
            resolved,
            root: canonical_root,
        });
    }

    Ok(ValidatedPath {
        root: canonical_root,
        path: resolved,
    })
}

/// Collapse `.` and `..` without touching the filesystem. `..` at the
/// filesystem root stays at the root.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Canonicalise the deepest existing ancestor of `path` and re-append the
/// remaining components.
///
/// A dangling symlink anywhere in the existing part is refused: following it
/// later could land anywhere.
fn canonicalize_existing_prefix(path: &Path) -> Result<PathBuf, String> {
    for ancestor in path.ancestors() {
        match fs::canonicalize(ancestor) {
            Ok(canonical) => {
                let tail = path
                    .strip_prefix(ancestor)
                    .map_err(|e| format!("internal prefix error: {e}"))?;
                return Ok(canonical.join(tail));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if fs::symlink_metadata(ancestor).is_ok() {
                    return Err(format!("dangling symlink at {}", ancestor.display()));
                }
            }
            Err(e) => return Err(format!("{}: {e}", ancestor.display())),
        }
    }
    Err("no existing ancestor".to_string())
}
