// src/watch/event_handler.rs

//! Turns watch events into "refresh the host" decisions.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::engine::LOG_TARGET;
use crate::watch::watcher::WatchEvent;

/// Paths the watcher reported as removed and that have not come back yet.
///
/// Lets an `Added` event for a re-created file be told apart from the adds a
/// backend may report when a path is first registered.
#[derive(Debug, Clone, Default)]
pub struct UnlinkedTracker {
    paths: Vec<PathBuf>,
}

impl UnlinkedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: &Path) {
        if !self.contains(path) {
            self.paths.push(path.to_path_buf());
        }
    }

    /// Remove `path`, returning whether it had been recorded.
    pub fn take(&mut self, path: &Path) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p != path);
        self.paths.len() != before
    }

    fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

/// Handle one event. Returns true when the host should re-run.
pub fn handle_watch_event(event: &WatchEvent, unlinked: &mut UnlinkedTracker) -> bool {
    match event {
        WatchEvent::Changed(path) => {
            info!(target: LOG_TARGET, "Changed file \"{}\".", path.display());
            true
        }
        WatchEvent::Removed(path) => {
            info!(target: LOG_TARGET, "Deleted file \"{}\".", path.display());
            unlinked.record(path);
            true
        }
        WatchEvent::Added(path) => {
            if unlinked.take(path) {
                info!(target: LOG_TARGET, "Added file \"{}\".", path.display());
                true
            } else {
                debug!(target: LOG_TARGET, ?path, "ignoring add of a path that was never removed");
                false
            }
        }
    }
}
