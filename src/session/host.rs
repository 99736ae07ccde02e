// src/session/host.rs

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::debug;

use crate::config::ConfigFile;
use crate::engine::Host;
use crate::types::FilePattern;

/// [`Host`] backed by a loaded config file.
///
/// File patterns are anchored at `root` so they can be compared with the
/// absolute source paths the session passes to the preprocessor. Refresh
/// requests are forwarded over a channel to the session loop.
#[derive(Debug)]
pub struct ConfigHost {
    auto_watch: bool,
    files: Vec<FilePattern>,
    refresh_tx: mpsc::UnboundedSender<()>,
}

impl ConfigHost {
    pub fn new(
        cfg: &ConfigFile,
        root: &Path,
        auto_watch: bool,
        refresh_tx: mpsc::UnboundedSender<()>,
    ) -> Self {
        let files = cfg
            .files
            .iter()
            .map(|entry| FilePattern::new(anchor(root, &entry.pattern), entry.watched))
            .collect();
        Self {
            auto_watch,
            files,
            refresh_tx,
        }
    }
}

impl Host for ConfigHost {
    fn auto_watch(&self) -> bool {
        self.auto_watch
    }

    fn files(&self) -> Vec<FilePattern> {
        self.files.clone()
    }

    fn refresh_files(&self) {
        if self.refresh_tx.send(()).is_err() {
            debug!("refresh requested after the session loop stopped");
        }
    }
}

fn anchor(root: &Path, pattern: &str) -> String {
    if Path::new(pattern).is_absolute() {
        return pattern.to_string();
    }
    let mut anchored = PathBuf::from(root);
    anchored.push(pattern);
    anchored.to_string_lossy().replace('\\', "/")
}
