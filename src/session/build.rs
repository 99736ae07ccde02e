// src/session/build.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use globset::GlobSet;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::Preprocessor;
use crate::fs::FileSystem;
use crate::types::{FileDescriptor, FilePattern};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::{build_globset, collect_matching_files};
use crate::watch::{FileWatcher, NotifyBackend, WatchEvent};

/// Outcome of compiling every source once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Output files written, relative to the output directory.
    pub written: Vec<PathBuf>,
    /// Sources whose compile failed.
    pub failed: Vec<PathBuf>,
}

impl BuildSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Compiles the configured sources of a project into an output directory.
#[derive(Debug)]
pub struct BuildSession {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    out_dir: PathBuf,
    sources: GlobSet,
    /// Sources seen by the previous `build_all`.
    built: Mutex<BTreeSet<PathBuf>>,
}

impl BuildSession {
    /// `root` is the project directory the file patterns are relative to;
    /// `out_dir` is resolved against it.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        out_dir: impl AsRef<Path>,
        files: &[FilePattern],
    ) -> Result<Self> {
        let root = root.into();
        let out_dir = root.join(out_dir);
        let sources = build_globset(files)?;
        Ok(Self {
            fs,
            root,
            out_dir,
            sources,
            built: Mutex::new(BTreeSet::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Source files currently matching the configured patterns, sorted.
    pub fn sources(&self) -> Result<Vec<PathBuf>> {
        collect_matching_files(
            self.fs.as_ref(),
            &self.root,
            &self.sources,
            std::slice::from_ref(&self.out_dir),
        )
    }

    /// Where the compiled output for `output_path` is written.
    ///
    /// Output paths inside the project keep their relative layout under the
    /// output directory; anything else is placed by file name.
    pub fn destination(&self, output_path: &Path) -> PathBuf {
        match relative_str(&self.root, output_path) {
            Some(rel) => self.out_dir.join(rel),
            None => self
                .out_dir
                .join(output_path.file_name().unwrap_or(output_path.as_os_str())),
        }
    }

    /// Compile every source once. Failing files are reported in the summary
    /// and do not stop the others.
    ///
    /// Sources that were built last time but no longer exist are dropped from
    /// the preprocessor, which stops watching their dependencies.
    pub async fn build_all(&self, preprocessor: &Preprocessor) -> Result<BuildSummary> {
        let mut summary = BuildSummary::default();
        let sources = self.sources()?;
        self.forget_vanished(preprocessor, &sources);

        for source in sources {
            let content = self
                .fs
                .read_to_string(&source)
                .with_context(|| format!("reading source {:?}", source))?;
            let mut file = FileDescriptor::new(source.clone());

            match preprocessor.process(&content, &mut file).await {
                Ok(css) => {
                    let dest = self.destination(&file.output_path);
                    self.fs.write(&dest, css.as_bytes())?;
                    debug!(source = ?source, dest = ?dest, "wrote compiled file");
                    let rel = dest.strip_prefix(&self.out_dir).unwrap_or(&dest).to_path_buf();
                    summary.written.push(rel);
                }
                Err(_) => summary.failed.push(source),
            }
        }

        info!(
            written = summary.written.len(),
            failed = summary.failed.len(),
            "build finished"
        );
        Ok(summary)
    }

    fn forget_vanished(&self, preprocessor: &Preprocessor, sources: &[PathBuf]) {
        let current: BTreeSet<PathBuf> = sources.iter().cloned().collect();
        let previous = {
            let mut built = match self.built.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::replace(&mut *built, current.clone())
        };

        for gone in previous.difference(&current) {
            let delta = preprocessor.forget(gone);
            info!(
                source = ?gone,
                released = delta.to_unwatch.len(),
                "source removed"
            );
        }
    }

    /// Watch the source files themselves; any change asks for a rebuild.
    ///
    /// The returned watcher must be kept alive for as long as watching is
    /// wanted.
    pub fn watch_sources(&self, refresh_tx: mpsc::UnboundedSender<()>) -> Result<FileWatcher> {
        let (tx, mut rx) = mpsc::unbounded_channel::<WatchEvent>();
        let mut watcher = FileWatcher::new(Box::new(NotifyBackend::spawn(tx)?));

        let sources = self.sources()?;
        if let Err(err) = watcher.watch(&sources) {
            warn!(error = %err, "failed to watch some sources");
        }
        info!(count = sources.len(), "watching sources under {:?}", self.root);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                info!(path = ?event.path(), "source changed");
                if refresh_tx.send(()).is_err() {
                    break;
                }
            }
        });

        Ok(watcher)
    }
}
