// src/watch/watcher.rs

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::{Result, StylewatchError};
use crate::watch::path_utils::canonical_key;

/// Change to a registered path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Changed(PathBuf),
    Added(PathBuf),
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Changed(p) | WatchEvent::Added(p) | WatchEvent::Removed(p) => p,
        }
    }
}

/// Low-level registration of literal file paths.
///
/// Production code uses [`NotifyBackend`]; tests can provide their own
/// implementation that records calls and emits events by hand.
pub trait WatchBackend: Send {
    fn watch(&mut self, paths: &[PathBuf]) -> Result<()>;
    fn unwatch(&mut self, paths: &[PathBuf]) -> Result<()>;
}

/// Builds the backend once the event channel exists.
pub type BackendFactory =
    Box<dyn FnOnce(mpsc::UnboundedSender<WatchEvent>) -> Result<Box<dyn WatchBackend>> + Send>;

/// Batch front-end over a [`WatchBackend`].
///
/// Keeps the set of registered paths so that repeated or empty batches never
/// reach the backend.
pub struct FileWatcher {
    backend: Box<dyn WatchBackend>,
    watched: BTreeSet<PathBuf>,
}

impl fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWatcher")
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    pub fn new(backend: Box<dyn WatchBackend>) -> Self {
        Self {
            backend,
            watched: BTreeSet::new(),
        }
    }

    /// Register `paths`. Already-registered paths are skipped.
    ///
    /// The paths are recorded even if the backend fails, so the registered
    /// set keeps mirroring what the caller asked for; the error is returned.
    pub fn watch(&mut self, paths: &[PathBuf]) -> Result<()> {
        let fresh = self.filter(paths, false);
        if fresh.is_empty() {
            return Ok(());
        }
        self.watched.extend(fresh.iter().cloned());
        self.backend.watch(&fresh)
    }

    /// Unregister `paths`. Unknown paths are skipped.
    pub fn unwatch(&mut self, paths: &[PathBuf]) -> Result<()> {
        let known = self.filter(paths, true);
        if known.is_empty() {
            return Ok(());
        }
        for path in &known {
            self.watched.remove(path);
        }
        self.backend.unwatch(&known)
    }

    pub fn watched(&self) -> &BTreeSet<PathBuf> {
        &self.watched
    }

    fn filter(&self, paths: &[PathBuf], registered: bool) -> Vec<PathBuf> {
        let mut seen = BTreeSet::new();
        paths
            .iter()
            .filter(|p| self.watched.contains(*p) == registered)
            .filter(|p| seen.insert(*p))
            .cloned()
            .collect()
    }
}

/// Registered files and the directories watched on their behalf.
#[derive(Debug, Default)]
struct Registry {
    /// Lookup key (as registered, or canonical) -> registered path.
    files: HashMap<PathBuf, PathBuf>,
    /// Directory -> number of registered files inside it.
    dirs: HashMap<PathBuf, usize>,
    /// Registered files whose removal has been reported.
    removed: HashSet<PathBuf>,
}

impl Registry {
    fn lookup(&self, path: &Path) -> Option<PathBuf> {
        if let Some(found) = self.files.get(path) {
            return Some(found.clone());
        }
        canonical_key(path).and_then(|key| self.files.get(&key).cloned())
    }

    /// Map a raw event onto its registered path.
    ///
    /// A create or rename-to over a file that was never reported removed is
    /// an in-place replacement (editors saving through a temp file), so it
    /// goes out as `Changed`.
    fn resolve(&mut self, event: WatchEvent) -> Option<WatchEvent> {
        let path = self.lookup(event.path())?;
        Some(match event {
            WatchEvent::Changed(_) => WatchEvent::Changed(path),
            WatchEvent::Removed(_) => {
                self.removed.insert(path.clone());
                WatchEvent::Removed(path)
            }
            WatchEvent::Added(_) => {
                if self.removed.remove(&path) {
                    WatchEvent::Added(path)
                } else {
                    WatchEvent::Changed(path)
                }
            }
        })
    }

    fn register(&mut self, path: &Path) {
        self.files.insert(path.to_path_buf(), path.to_path_buf());
        if let Some(key) = canonical_key(path) {
            self.files.insert(key, path.to_path_buf());
        }
    }

    /// Drop `path`; returns whether it was registered.
    fn release(&mut self, path: &Path) -> bool {
        let before = self.files.len();
        self.files.retain(|_, registered| registered != path);
        self.removed.remove(path);
        self.files.len() != before
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// `notify`-backed watcher.
///
/// Each registered file's parent directory is watched non-recursively and
/// events are filtered down to registered files, so a file that is deleted
/// and later re-created is still observed. Dropping the backend stops all
/// watching.
pub struct NotifyBackend {
    inner: RecommendedWatcher,
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyBackend").finish_non_exhaustive()
    }
}

impl NotifyBackend {
    /// Create the watcher; events for registered files go to `events`.
    pub fn spawn(events: mpsc::UnboundedSender<WatchEvent>) -> Result<Self> {
        let registry = Arc::new(Mutex::new(Registry::default()));

        let inner = RecommendedWatcher::new(
            {
                let registry = Arc::clone(&registry);
                move |res: notify::Result<Event>| match res {
                    Ok(event) => {
                        for raw in classify(&event) {
                            let Some(watch_event) = lock(&registry).resolve(raw) else {
                                continue;
                            };
                            if events.send(watch_event).is_err() {
                                debug!("watch event receiver dropped");
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "file watch error");
                    }
                }
            },
            Config::default(),
        )?;

        Ok(Self { inner, registry })
    }

    /// Shorthand for the production [`BackendFactory`].
    pub fn factory() -> BackendFactory {
        Box::new(
            |tx: mpsc::UnboundedSender<WatchEvent>| -> Result<Box<dyn WatchBackend>> {
                Ok(Box::new(NotifyBackend::spawn(tx)?))
            },
        )
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, paths: &[PathBuf]) -> Result<()> {
        let mut first_error: Option<StylewatchError> = None;
        for path in paths {
            let Some(dir) = path.parent().map(Path::to_path_buf) else {
                first_error.get_or_insert(StylewatchError::InvalidPattern(format!(
                    "cannot watch {:?}: no parent directory",
                    path
                )));
                continue;
            };

            {
                let mut registry = lock(&self.registry);
                registry.register(path);
                if let Some(count) = registry.dirs.get_mut(&dir) {
                    *count += 1;
                    continue;
                }
            }

            // Counted only once notify accepts it.
            match self.inner.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    *lock(&self.registry).dirs.entry(dir).or_insert(0) += 1;
                }
                Err(err) => {
                    lock(&self.registry).release(path);
                    first_error.get_or_insert(err.into());
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn unwatch(&mut self, paths: &[PathBuf]) -> Result<()> {
        let mut first_error: Option<StylewatchError> = None;
        for path in paths {
            let released_dir = {
                let mut registry = lock(&self.registry);
                if !registry.release(path) {
                    continue;
                }
                match path.parent() {
                    Some(dir) => match registry.dirs.get_mut(dir) {
                        Some(count) if *count > 1 => {
                            *count -= 1;
                            None
                        }
                        Some(_) => {
                            registry.dirs.remove(dir);
                            Some(dir.to_path_buf())
                        }
                        None => None,
                    },
                    None => None,
                }
            };

            if let Some(dir) = released_dir {
                if let Err(err) = self.inner.unwatch(&dir) {
                    first_error.get_or_insert(err.into());
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Map a raw notify event onto watch events (one per affected path).
fn classify(event: &Event) -> Vec<WatchEvent> {
    match &event.kind {
        EventKind::Create(_) => event.paths.iter().cloned().map(WatchEvent::Added).collect(),
        EventKind::Remove(_) => event.paths.iter().cloned().map(WatchEvent::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().cloned().map(WatchEvent::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().cloned().map(WatchEvent::Added).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::with_capacity(2);
            if let Some(from) = event.paths.first() {
                out.push(WatchEvent::Removed(from.clone()));
            }
            if let Some(to) = event.paths.get(1) {
                out.push(WatchEvent::Added(to.clone()));
            }
            out
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => event.paths.iter().cloned().map(WatchEvent::Changed).collect(),
        _ => Vec::new(),
    }
}
