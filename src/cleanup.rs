//! Removal of paths made obsolete by a new build.

use crate::error::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Delete `path` and everything beneath it.
///
/// Works for files and directories alike. An empty or non-existent path is a
/// no-op. Directories are walked with an explicit work-list on the heap, so
/// tree depth is bounded by memory rather than by the call stack. Symbolic
/// links are removed as links, never followed.
///
/// # Errors
///
/// Returns the first filesystem error encountered; entries removed before it
/// stay removed.
pub fn recursive_delete(path: &Path) -> Result<()> {
    let raw = path.as_os_str();
    if raw.is_empty() {
        return Ok(());
    }

    let path = strip_trailing_separator(path);
    match std::fs::symlink_metadata(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    // (path, children_done): a directory is pushed back with `true` before
    // its children so it is removed only once they are gone.
    let mut pending: Vec<(PathBuf, bool)> = vec![(path, false)];
    while let Some((current, children_done)) = pending.pop() {
        if children_done {
            std::fs::remove_dir(&current)?;
            debug!(path = %current.display(), "removed directory");
            continue;
        }

        if std::fs::symlink_metadata(&current)?.is_dir() {
            pending.push((current.clone(), true));
            for child in std::fs::read_dir(&current)? {
                pending.push((child?.path(), false));
            }
        } else {
            std::fs::remove_file(&current)?;
            debug!(path = %current.display(), "removed file");
        }
    }

    Ok(())
}

fn strip_trailing_separator(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    match text.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => PathBuf::from(stripped),
        _ => path.to_path_buf(),
    }
}
