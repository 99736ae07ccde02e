// src/engine/preprocessor.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::transform::{Transform, TransformError, TransformOptions, TransformRunner};
use crate::types::FileDescriptor;
use crate::watch::path_utils::absolutize;
use crate::watch::{
    BackendFactory, DependencyIndex, FileWatcher, NotifyBackend, UnlinkedTracker, WatchDelta,
    WatchEvent, handle_watch_event, is_watch_eligible,
};

use super::LOG_TARGET;
use super::host::Host;
use super::locks::ParentLocks;
use super::path::{DefaultPathTransformer, PathTransformer};

/// One layer of preprocessor settings.
///
/// Used twice: once for the host-level config and once for the custom args
/// of a particular preprocessor instance (which win).
#[derive(Clone, Default)]
pub struct PreprocessorSettings {
    pub options: TransformOptions,
    pub transform_path: Option<Arc<dyn PathTransformer>>,
}

impl fmt::Debug for PreprocessorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreprocessorSettings")
            .field("options", &self.options)
            .field("transform_path", &self.transform_path.is_some())
            .finish()
    }
}

impl PreprocessorSettings {
    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_transform_path(mut self, transform: impl PathTransformer + 'static) -> Self {
        self.transform_path = Some(Arc::new(transform));
        self
    }
}

/// Shared watch state: the index and the watcher registered from it are
/// always updated under the same lock, so their key sets stay equal.
#[derive(Debug, Default)]
struct WatchState {
    index: DependencyIndex,
    watcher: Option<FileWatcher>,
}

/// The dependency-watching preprocessor.
///
/// For every file the host hands it, it sets the output path, runs the
/// transform chain and, in watch mode, keeps the watcher registered on
/// exactly the files the watched sources currently import.
pub struct Preprocessor {
    runner: TransformRunner,
    transform_path: Arc<dyn PathTransformer>,
    host: Arc<dyn Host>,
    state: Mutex<WatchState>,
    locks: ParentLocks,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preprocessor")
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl Preprocessor {
    /// Build a preprocessor using the `notify` watcher in watch mode.
    ///
    /// Must be called inside a Tokio runtime when the host is in watch mode.
    pub fn new(
        args: PreprocessorSettings,
        config: PreprocessorSettings,
        host: Arc<dyn Host>,
        chain: Arc<dyn Transform>,
    ) -> Result<Self> {
        Self::with_watch_backend(args, config, host, chain, NotifyBackend::factory())
    }

    /// Same as [`Preprocessor::new`] with a caller-supplied watch backend.
    ///
    /// `make_backend` is only called when the host is in watch mode.
    pub fn with_watch_backend(
        args: PreprocessorSettings,
        config: PreprocessorSettings,
        host: Arc<dyn Host>,
        chain: Arc<dyn Transform>,
        make_backend: BackendFactory,
    ) -> Result<Self> {
        let options = TransformOptions::layered(&config.options, &args.options);
        let transform_path = args
            .transform_path
            .or(config.transform_path)
            .unwrap_or_else(|| Arc::new(DefaultPathTransformer));

        let mut state = WatchState::default();
        let mut event_loop = None;
        if host.auto_watch() {
            let (tx, rx) = mpsc::unbounded_channel();
            state.watcher = Some(FileWatcher::new(make_backend(tx)?));
            event_loop = Some(spawn_event_loop(rx, Arc::clone(&host)));
            debug!(target: LOG_TARGET, "dependency watcher started");
        }

        Ok(Self {
            runner: TransformRunner::new(chain, options),
            transform_path,
            host,
            state: Mutex::new(state),
            locks: ParentLocks::new(),
            event_loop: Mutex::new(event_loop),
        })
    }

    /// Compile one file.
    ///
    /// `file.output_path` is set before the chain runs, so the host sees it
    /// even when this returns an error. On failure the dependency index is
    /// left untouched.
    pub async fn process(
        &self,
        content: &str,
        file: &mut FileDescriptor,
    ) -> std::result::Result<String, TransformError> {
        let source = file.source_path().to_path_buf();
        debug!(target: LOG_TARGET, "Processing \"{}\".", source.display());

        file.output_path = self.transform_path.transform(&source);

        let parent = absolutize(&source);
        let _guard = self.locks.acquire(&parent).await;

        let output = self.runner.run(content, &source).await?;

        if output.map.is_some() {
            file.source_map = output.map.clone();
        }

        if self.is_watch_eligible(&source) {
            self.track_dependencies(&parent, &output.dependencies);
        }

        Ok(output.css)
    }

    /// Drop every dependency recorded for `source` (e.g. the host removed
    /// the file from its list).
    pub fn forget(&self, source: &Path) -> WatchDelta {
        let parent = absolutize(source);
        self.apply(|index| index.forget(&parent))
    }

    /// Stop watching and shut the event loop down. Idempotent.
    pub fn close(&self) {
        let watcher = self.state().watcher.take();
        if watcher.is_some() {
            debug!(target: LOG_TARGET, "dependency watcher closed");
        }
        drop(watcher);
        if let Some(handle) = self.event_loop_handle().take() {
            handle.abort();
        }
    }

    /// Whether a watcher was created for this instance.
    pub fn has_watcher(&self) -> bool {
        self.state().watcher.is_some()
    }

    /// Parents with a `process` call in flight.
    pub fn pending_parents(&self) -> usize {
        self.locks.len()
    }

    /// Paths currently registered with the watcher, sorted.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.state()
            .watcher
            .as_ref()
            .map(|w| w.watched().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every dependency in the index, sorted.
    pub fn indexed_dependencies(&self) -> Vec<PathBuf> {
        self.state().index.dependencies().cloned().collect()
    }

    /// Dependencies recorded for `source`, sorted.
    pub fn dependencies_of(&self, source: &Path) -> Vec<PathBuf> {
        self.state().index.dependencies_of(&absolutize(source))
    }

    pub fn options(&self) -> &TransformOptions {
        self.runner.options()
    }

    fn is_watch_eligible(&self, source: &Path) -> bool {
        self.has_watcher() && is_watch_eligible(self.host.auto_watch(), &self.host.files(), source)
    }

    fn track_dependencies(&self, parent: &Path, dependencies: &[PathBuf]) {
        self.apply(|index| index.reconcile(parent, dependencies));
    }

    /// Run one index mutation and push its delta to the watcher, atomically.
    fn apply(&self, mutate: impl FnOnce(&mut DependencyIndex) -> WatchDelta) -> WatchDelta {
        let mut state = self.state();
        let WatchState { index, watcher } = &mut *state;
        let Some(watcher) = watcher.as_mut() else {
            return WatchDelta::default();
        };

        let delta = mutate(index);

        for path in &delta.to_watch {
            debug!(target: LOG_TARGET, "Watching \"{}\".", path.display());
        }
        if let Err(err) = watcher.watch(&delta.to_watch) {
            warn!(target: LOG_TARGET, error = %err, "failed to watch dependencies");
        }

        for path in &delta.to_unwatch {
            debug!(target: LOG_TARGET, "Stop watching \"{}\".", path.display());
        }
        if let Err(err) = watcher.unwatch(&delta.to_unwatch) {
            warn!(target: LOG_TARGET, error = %err, "failed to unwatch dependencies");
        }

        delta
    }

    fn state(&self) -> MutexGuard<'_, WatchState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn event_loop_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.event_loop.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for Preprocessor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consume watch events one at a time and refresh the host when needed.
fn spawn_event_loop(
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
    host: Arc<dyn Host>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut unlinked = UnlinkedTracker::new();
        while let Some(event) = events.recv().await {
            debug!(target: LOG_TARGET, ?event, "received watch event");
            if handle_watch_event(&event, &mut unlinked) {
                host.refresh_files();
            }
        }
        debug!(target: LOG_TARGET, "watch event loop finished");
    })
}
