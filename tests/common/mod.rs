#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stylewatch::engine::{Host, Preprocessor, PreprocessorSettings};
use stylewatch::transform::Transform;
use stylewatch_test_utils::recording::{RecordingHost, WatchRecorder};

pub use stylewatch_test_utils::{capture_logs, init_tracing, with_timeout};

/// Absolute path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture_source(name: &str) -> String {
    std::fs::read_to_string(fixture(name)).expect("fixture exists")
}

pub fn fixture_str(name: &str) -> String {
    fixture(name).to_string_lossy().into_owned()
}

/// Preprocessor wired to a recording watch backend.
pub fn preprocessor_with(
    args: PreprocessorSettings,
    host: Arc<RecordingHost>,
    chain: Arc<dyn Transform>,
) -> (Preprocessor, WatchRecorder) {
    let recorder = WatchRecorder::new();
    let host: Arc<dyn Host> = host;
    let pre = Preprocessor::with_watch_backend(
        args,
        PreprocessorSettings::default(),
        host,
        chain,
        recorder.factory(),
    )
    .expect("preprocessor builds");
    (pre, recorder)
}

/// Flatten recorded batches into one sorted list.
pub fn flatten(batches: &[Vec<PathBuf>]) -> Vec<PathBuf> {
    let mut all: Vec<PathBuf> = batches.iter().flatten().cloned().collect();
    all.sort();
    all
}
