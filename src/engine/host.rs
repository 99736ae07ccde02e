// src/engine/host.rs

use crate::types::FilePattern;

/// What the preprocessor needs from the test runner hosting it.
///
/// Every method is queried at call time; the host's file list may change
/// between runs.
pub trait Host: Send + Sync {
    /// Whether the host runs in watch mode.
    fn auto_watch(&self) -> bool;

    /// Current file list of the host.
    fn files(&self) -> Vec<FilePattern>;

    /// Re-run whatever depends on the preprocessed files.
    fn refresh_files(&self);
}
