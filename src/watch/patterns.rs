// src/watch/patterns.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::fs::FileSystem;
use crate::types::FilePattern;
use crate::watch::path_utils::absolutize;

/// Whether `source` is subject to dependency watching.
///
/// True iff `auto_watch` is on and some `watched` entry of `files` names the
/// file: either its pattern equals the source path, or the pattern is a glob
/// that matches it.
///
/// Evaluated against the file list as it is now; callers must not cache the
/// answer.
pub fn is_watch_eligible(auto_watch: bool, files: &[FilePattern], source: &Path) -> bool {
    auto_watch
        && files
            .iter()
            .filter(|entry| entry.watched)
            .any(|entry| pattern_matches(&entry.pattern, source))
}

/// Exact path equality first, then glob matching.
pub fn pattern_matches(pattern: &str, source: &Path) -> bool {
    let pattern_path = Path::new(pattern);
    if pattern_path == source || absolutize(pattern_path) == absolutize(source) {
        return true;
    }
    match Glob::new(pattern) {
        Ok(glob) => glob.compile_matcher().is_match(source),
        Err(err) => {
            debug!(pattern, error = %err, "file pattern is not a valid glob");
            false
        }
    }
}

/// Compile every pattern of `files` into one set (used to list the sources).
pub fn build_globset(files: &[FilePattern]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for entry in files {
        let glob = Glob::new(&entry.pattern)
            .with_context(|| format!("invalid glob pattern: {}", entry.pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Collect all files under `root` whose root-relative path matches `set`.
///
/// Directories listed in `skip` (e.g. the output directory) are not entered.
/// The result is sorted.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    set: &GlobSet,
    skip: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                if !skip.iter().any(|s| s == &path) {
                    stack.push(path);
                }
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    if set.is_match(&rel_str) {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}
