//! Project file listing for the fix prompt.

use std::path::Path;

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into.
const IGNORED_DIRS: &[&str] = &[
    "build",
    ".git",
    ".gradle",
    ".idea",
    "target",
    "node_modules",
    ".cache",
];

/// File extensions worth showing to the model.
const SOURCE_EXTENSIONS: &[&str] = &["kt", "kts", "java", "xml", "gradle", "properties"];

/// A bounded listing of source files under the project root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectSnapshot {
    /// Paths relative to the project root, `/`-separated.
    pub files: Vec<String>,
    /// Whether the scan stopped at its limit.
    pub truncated: bool,
}

impl ProjectSnapshot {
    /// Scans `root` for source files.
    ///
    /// Stops after `scan_limit` matches and keeps the first `listing_limit`.
    /// With `sorted`, directories are walked in file-name order so the
    /// listing is the same on every run and filesystem.
    pub fn scan(root: &Path, scan_limit: usize, listing_limit: usize, sorted: bool) -> Self {
        let mut walker = WalkDir::new(root);
        if sorted {
            walker = walker.sort_by_file_name();
        }

        let mut files = Vec::new();
        let mut truncated = false;
        for entry in walker.into_iter().filter_entry(|e| !is_ignored_dir(e)) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_source_extension(entry.path()) {
                continue;
            }
            if files.len() >= scan_limit {
                truncated = true;
                break;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            files.push(to_slash_path(relative));
        }

        if files.is_empty() {
            warn!(root = %root.display(), "No source files found for project context");
        }
        if files.len() > listing_limit {
            files.truncate(listing_limit);
            truncated = true;
        }

        Self { files, truncated }
    }

    /// Newline-separated listing for the prompt.
    pub fn listing(&self) -> String {
        self.files.join("\n")
    }
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    // depth 0 is the root itself, which may legitimately be called "build"
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
