//! Fakes for the preprocessor's collaborators: a watch backend that records
//! every batch and lets tests inject events, and a host that counts refreshes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, mpsc};

use stylewatch::engine::Host;
use stylewatch::errors::Result;
use stylewatch::types::FilePattern;
use stylewatch::watch::{BackendFactory, WatchBackend, WatchEvent};

/// One backend call, as recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOp {
    Watch(Vec<PathBuf>),
    Unwatch(Vec<PathBuf>),
}

#[derive(Default)]
struct RecorderState {
    instances: usize,
    ops: Vec<WatchOp>,
    events: Option<mpsc::UnboundedSender<WatchEvent>>,
}

/// Handle on everything the [`RecordingBackend`]s built from it saw.
#[derive(Clone, Default)]
pub struct WatchRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl WatchRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend factory to hand to `Preprocessor::with_watch_backend`.
    pub fn factory(&self) -> BackendFactory {
        let state = Arc::clone(&self.state);
        Box::new(
            move |events: mpsc::UnboundedSender<WatchEvent>| -> Result<Box<dyn WatchBackend>> {
                let mut guard = state.lock().unwrap();
                guard.instances += 1;
                guard.events = Some(events);
                drop(guard);
                Ok(Box::new(RecordingBackend { state }))
            },
        )
    }

    /// Number of backends created.
    pub fn instances(&self) -> usize {
        self.state.lock().unwrap().instances
    }

    /// Every backend call, interleaved in the order it happened.
    pub fn ops(&self) -> Vec<WatchOp> {
        self.state.lock().unwrap().ops.clone()
    }

    /// Every `watch` batch, in order.
    pub fn watch_calls(&self) -> Vec<Vec<PathBuf>> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                WatchOp::Watch(paths) => Some(paths),
                WatchOp::Unwatch(_) => None,
            })
            .collect()
    }

    /// Every `unwatch` batch, in order.
    pub fn unwatch_calls(&self) -> Vec<Vec<PathBuf>> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                WatchOp::Unwatch(paths) => Some(paths),
                WatchOp::Watch(_) => None,
            })
            .collect()
    }

    /// Forget recorded batches (the event channel is kept).
    pub fn clear(&self) {
        self.state.lock().unwrap().ops.clear();
    }

    /// Deliver `event` to the preprocessor as if the filesystem produced it.
    pub fn emit(&self, event: WatchEvent) {
        let guard = self.state.lock().unwrap();
        let tx = guard.events.as_ref().expect("no backend created yet");
        tx.send(event).expect("event loop stopped");
    }
}

/// [`WatchBackend`] that only records what it is asked to do.
pub struct RecordingBackend {
    state: Arc<Mutex<RecorderState>>,
}

impl WatchBackend for RecordingBackend {
    fn watch(&mut self, paths: &[PathBuf]) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .ops
            .push(WatchOp::Watch(paths.to_vec()));
        Ok(())
    }

    fn unwatch(&mut self, paths: &[PathBuf]) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .ops
            .push(WatchOp::Unwatch(paths.to_vec()));
        Ok(())
    }
}

/// [`Host`] with a mutable file list and a refresh counter.
pub struct RecordingHost {
    auto_watch: bool,
    files: Mutex<Vec<FilePattern>>,
    refreshes: AtomicUsize,
    refreshed: Notify,
}

impl RecordingHost {
    pub fn new(auto_watch: bool, files: Vec<FilePattern>) -> Arc<Self> {
        Arc::new(Self {
            auto_watch,
            files: Mutex::new(files),
            refreshes: AtomicUsize::new(0),
            refreshed: Notify::new(),
        })
    }

    /// Watch mode on, with every listed path flagged watched.
    pub fn watching<S: AsRef<str>>(paths: &[S]) -> Arc<Self> {
        Self::new(
            true,
            paths
                .iter()
                .map(|p| FilePattern::new(p.as_ref(), true))
                .collect(),
        )
    }

    pub fn set_files(&self, files: Vec<FilePattern>) {
        *self.files.lock().unwrap() = files;
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Wait (up to 5 seconds) for the next refresh.
    pub async fn wait_for_refresh(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.refreshed.notified())
            .await
            .expect("host was not refreshed within 5 seconds");
    }
}

impl Host for RecordingHost {
    fn auto_watch(&self) -> bool {
        self.auto_watch
    }

    fn files(&self) -> Vec<FilePattern> {
        self.files.lock().unwrap().clone()
    }

    fn refresh_files(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.refreshed.notify_one();
    }
}
