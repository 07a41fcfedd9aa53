//! Project-root containment for fix targets.
//!
//! Fix paths come from a model response and are untrusted. A path is only
//! accepted if it is relative, has no `..` component, and its nearest
//! existing ancestor canonicalizes to somewhere under the project root
//! (which also catches symlinks pointing outside).

use std::path::{Component, Path, PathBuf};

use crate::error::ApplyError;

/// A fix target resolved against the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPath {
    /// Absolute path used for I/O.
    pub absolute: PathBuf,
    /// Path relative to the project root, for logging and reports.
    pub relative: PathBuf,
}

/// Resolves `candidate` under `project_root`, allowing targets that do not
/// exist yet.
pub fn resolve_project_path(project_root: &Path, candidate: &str) -> Result<ProjectPath, ApplyError> {
    let invalid = |reason: &str| ApplyError::InvalidPath {
        path: candidate.to_string(),
        reason: reason.to_string(),
    };

    if candidate.trim().is_empty() {
        return Err(invalid("path is empty"));
    }
    if candidate.contains('\0') {
        return Err(invalid("path contains a null byte"));
    }

    let relative = Path::new(candidate);
    if relative.is_absolute() || relative.has_root() {
        return Err(ApplyError::PathEscape(candidate.to_string()));
    }

    let mut cleaned = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ApplyError::PathEscape(candidate.to_string()));
            }
        }
    }
    if cleaned.as_os_str().is_empty() {
        return Err(invalid("path does not name a file"));
    }

    let root = project_root.canonicalize()?;
    let joined = root.join(&cleaned);
    let anchor = canonicalize_existing_ancestor(&joined)?;
    if !anchor.starts_with(&root) {
        return Err(ApplyError::PathEscape(candidate.to_string()));
    }

    Ok(ProjectPath {
        absolute: joined,
        relative: cleaned,
    })
}

fn canonicalize_existing_ancestor(path: &Path) -> Result<PathBuf, ApplyError> {
    let mut current = path.to_path_buf();
    // symlink_metadata so a dangling symlink still counts as existing and
    // gets canonicalized (and rejected) rather than skipped.
    while current.symlink_metadata().is_err() {
        if !current.pop() {
            return Err(ApplyError::InvalidPath {
                path: path.display().to_string(),
                reason: "no existing ancestor".to_string(),
            });
        }
    }
    Ok(current.canonicalize()?)
}
