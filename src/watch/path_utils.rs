// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Path, PathBuf};

/// Absolute form of `path`, resolved against the current directory.
///
/// Does not touch the filesystem, so it works for files that were deleted.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Canonical form of `path` that still works once the file itself is gone:
/// the parent directory is canonicalized and the file name re-attached.
///
/// Returns `None` when the parent cannot be canonicalized either.
pub fn canonical_key(path: &Path) -> Option<PathBuf> {
    if let Ok(canon) = path.canonicalize() {
        return Some(canon);
    }
    let parent = path.parent()?.canonicalize().ok()?;
    Some(parent.join(path.file_name()?))
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        let s = rel.to_string_lossy().replace('\\', "/");
        return Some(s);
    }

    // Different absolute prefixes may be used for the same directory
    // (symlinks, /private/var/... on macOS).
    if let (Ok(root_canon), Some(path_canon)) = (root.canonicalize(), canonical_key(path)) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            let s = rel.to_string_lossy().replace('\\', "/");
            return Some(s);
        }
    }

    None
}
