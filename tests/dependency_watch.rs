// tests/dependency_watch.rs

mod common;
use crate::common::{
    capture_logs, fixture, fixture_source, fixture_str, flatten, init_tracing, preprocessor_with,
    with_timeout,
};

use std::sync::Arc;
use std::time::Duration;

use stylewatch::engine::{Host, Preprocessor, PreprocessorSettings};
use stylewatch::types::{FileDescriptor, FilePattern};
use stylewatch::watch::WatchEvent;
use stylewatch_test_utils::fake_chain::FakeChain;
use stylewatch_test_utils::recording::RecordingHost;

const WITH_ALT: &str = "@import 'partials/partial-alt';\n\n.with-partial {\n  display: block;\n}\n";

#[tokio::test]
async fn watches_nested_partials_in_one_batch() {
    init_tracing();

    let host = RecordingHost::watching(&[fixture_str("with-partial.css")]);
    let (pre, recorder) =
        preprocessor_with(PreprocessorSettings::default(), host, Arc::new(FakeChain::new()));
    assert_eq!(recorder.instances(), 1);

    let source = fixture("with-partial.css");
    let mut file = FileDescriptor::new(&source);
    let css = pre
        .process(&fixture_source("with-partial.css"), &mut file)
        .await
        .expect("compiles");

    assert!(css.contains(".partial"));
    assert!(css.contains(".sub-partial"));

    let partial = fixture("partials/partial.css");
    let sub_partial = fixture("partials/sub-partial.css");
    assert_eq!(
        recorder.watch_calls(),
        vec![vec![partial.clone(), sub_partial.clone()]]
    );
    assert!(recorder.unwatch_calls().is_empty());
    assert_eq!(pre.watched_paths(), vec![partial.clone(), sub_partial.clone()]);
    assert_eq!(pre.dependencies_of(&source), vec![partial, sub_partial]);
}

#[tokio::test]
async fn switching_an_import_moves_the_watch() {
    let host = RecordingHost::watching(&[fixture_str("with-partial.css")]);
    let (pre, recorder) =
        preprocessor_with(PreprocessorSettings::default(), host, Arc::new(FakeChain::new()));

    let source = fixture("with-partial.css");
    pre.process(&fixture_source("with-partial.css"), &mut FileDescriptor::new(&source))
        .await
        .expect("compiles");
    recorder.clear();

    pre.process(WITH_ALT, &mut FileDescriptor::new(&source))
        .await
        .expect("compiles");

    let alt = fixture("partials/partial-alt.css");
    assert_eq!(recorder.watch_calls(), vec![vec![alt.clone()]]);
    assert_eq!(
        flatten(&recorder.unwatch_calls()),
        vec![
            fixture("partials/partial.css"),
            fixture("partials/sub-partial.css")
        ]
    );
    assert_eq!(pre.watched_paths(), vec![alt]);
}

#[tokio::test]
async fn logs_processing_and_watch_changes() {
    let (logs, _guard) = capture_logs();

    let host = RecordingHost::watching(&[fixture_str("with-partial.css")]);
    let (pre, _recorder) =
        preprocessor_with(PreprocessorSettings::default(), host, Arc::new(FakeChain::new()));

    let source = fixture("with-partial.css");
    pre.process(&fixture_source("with-partial.css"), &mut FileDescriptor::new(&source))
        .await
        .expect("compiles");
    pre.process(WITH_ALT, &mut FileDescriptor::new(&source))
        .await
        .expect("compiles");

    let output = logs.contents();
    let partial = fixture("partials/partial.css");
    let alt = fixture("partials/partial-alt.css");
    assert_eq!(
        output
            .matches(&format!("Processing \"{}\".", source.display()))
            .count(),
        2,
        "{output}"
    );
    assert!(output.contains(&format!("Watching \"{}\".", partial.display())));
    assert!(output.contains(&format!("Watching \"{}\".", alt.display())));
    assert!(output.contains(&format!("Stop watching \"{}\".", partial.display())));
    assert!(output.contains("stylewatch::preprocessor"));
}

#[tokio::test]
async fn recompiling_unchanged_content_is_a_no_op() {
    let host = RecordingHost::watching(&[fixture_str("with-partial.css")]);
    let (pre, recorder) =
        preprocessor_with(PreprocessorSettings::default(), host, Arc::new(FakeChain::new()));

    let source = fixture("with-partial.css");
    let content = fixture_source("with-partial.css");
    pre.process(&content, &mut FileDescriptor::new(&source))
        .await
        .expect("compiles");
    let watched = pre.watched_paths();
    recorder.clear();

    pre.process(&content, &mut FileDescriptor::new(&source))
        .await
        .expect("compiles");

    assert!(recorder.watch_calls().is_empty());
    assert!(recorder.unwatch_calls().is_empty());
    assert_eq!(pre.watched_paths(), watched);
}

#[tokio::test]
async fn shared_dependency_stays_watched_while_referenced() {
    let first = fixture("with-partial.css");
    let second = fixture("second.css");
    let host = RecordingHost::watching(&[fixture_str("with-partial.css"), fixture_str("second.css")]);
    let (pre, recorder) =
        preprocessor_with(PreprocessorSettings::default(), host, Arc::new(FakeChain::new()));

    let partial = fixture("partials/partial.css");
    let sub_partial = fixture("partials/sub-partial.css");

    pre.process(&fixture_source("with-partial.css"), &mut FileDescriptor::new(&first))
        .await
        .expect("compiles");
    pre.process("@import 'partials/partial';\n", &mut FileDescriptor::new(&second))
        .await
        .expect("compiles");
    // Second parent adds no new watches.
    assert_eq!(recorder.watch_calls().len(), 1);

    pre.process(WITH_ALT, &mut FileDescriptor::new(&first))
        .await
        .expect("compiles");
    assert!(recorder.unwatch_calls().is_empty());
    assert!(pre.watched_paths().contains(&partial));

    let delta = pre.forget(&second);
    assert_eq!(delta.to_unwatch, vec![partial.clone(), sub_partial.clone()]);
    assert_eq!(
        flatten(&recorder.unwatch_calls()),
        vec![partial, sub_partial]
    );
    assert_eq!(pre.watched_paths(), vec![fixture("partials/partial-alt.css")]);
}

#[tokio::test]
async fn failed_compile_leaves_the_index_alone() {
    let (logs, _guard) = capture_logs();

    let host = RecordingHost::watching(&[fixture_str("with-partial.css")]);
    let (pre, recorder) =
        preprocessor_with(PreprocessorSettings::default(), host, Arc::new(FakeChain::new()));

    let source = fixture("with-partial.css");
    pre.process(&fixture_source("with-partial.css"), &mut FileDescriptor::new(&source))
        .await
        .expect("compiles");
    let before = pre.indexed_dependencies();
    recorder.clear();

    let broken = "@import 'partials/partial-alt';\n@mixin missing;\n";
    let err = pre
        .process(broken, &mut FileDescriptor::new(&source))
        .await
        .expect_err("undefined mixin");
    assert_eq!(err.line, Some(2));

    assert_eq!(pre.indexed_dependencies(), before);
    assert!(recorder.watch_calls().is_empty());
    assert!(recorder.unwatch_calls().is_empty());
    assert_eq!(logs.contents().matches("Undefined mixin missing").count(), 1);
}

#[tokio::test]
async fn unwatched_entry_gets_no_dependency_tracking() {
    let host = RecordingHost::new(
        true,
        vec![FilePattern::new(fixture_str("with-partial.css"), false)],
    );
    let (pre, recorder) =
        preprocessor_with(PreprocessorSettings::default(), host, Arc::new(FakeChain::new()));

    pre.process(
        &fixture_source("with-partial.css"),
        &mut FileDescriptor::new(fixture("with-partial.css")),
    )
    .await
    .expect("compiles");

    assert!(pre.has_watcher());
    assert!(recorder.watch_calls().is_empty());
    assert!(pre.indexed_dependencies().is_empty());
}

#[tokio::test]
async fn glob_entry_makes_files_eligible() {
    let dir = fixture("with-partial.css");
    let dir = dir.parent().expect("fixtures dir");
    let pattern = format!("{}/*.css", dir.display());
    let host = RecordingHost::new(true, vec![FilePattern::new(pattern, true)]);
    let (pre, _recorder) =
        preprocessor_with(PreprocessorSettings::default(), host, Arc::new(FakeChain::new()));

    pre.process(
        &fixture_source("with-partial.css"),
        &mut FileDescriptor::new(fixture("with-partial.css")),
    )
    .await
    .expect("compiles");

    assert_eq!(pre.watched_paths().len(), 2);
}

#[tokio::test]
async fn file_list_is_read_at_call_time() {
    let host = RecordingHost::watching(&[fixture_str("with-partial.css")]);
    let (pre, recorder) = preprocessor_with(
        PreprocessorSettings::default(),
        host.clone(),
        Arc::new(FakeChain::new()),
    );

    let source = fixture("with-partial.css");
    pre.process(&fixture_source("with-partial.css"), &mut FileDescriptor::new(&source))
        .await
        .expect("compiles");
    recorder.clear();

    host.set_files(Vec::new());
    pre.process(WITH_ALT, &mut FileDescriptor::new(&source))
        .await
        .expect("compiles");

    assert!(recorder.watch_calls().is_empty());
    assert!(recorder.unwatch_calls().is_empty());
    assert_eq!(pre.dependencies_of(&source).len(), 2);
}

#[tokio::test]
async fn change_and_delete_refresh_the_host() {
    let host = RecordingHost::watching(&[fixture_str("with-partial.css")]);
    let (pre, recorder) = preprocessor_with(
        PreprocessorSettings::default(),
        host.clone(),
        Arc::new(FakeChain::new()),
    );
    let partial = fixture("partials/partial.css");

    recorder.emit(WatchEvent::Changed(partial.clone()));
    host.wait_for_refresh().await;
    assert_eq!(host.refreshes(), 1);

    recorder.emit(WatchEvent::Removed(partial));
    host.wait_for_refresh().await;
    assert_eq!(host.refreshes(), 2);

    drop(pre);
}

#[tokio::test]
async fn add_without_prior_delete_is_ignored() {
    let (logs, _guard) = capture_logs();

    let host = RecordingHost::watching(&[fixture_str("with-partial.css")]);
    let (_pre, recorder) = preprocessor_with(
        PreprocessorSettings::default(),
        host.clone(),
        Arc::new(FakeChain::new()),
    );
    let partial = fixture("partials/partial.css");
    let sub_partial = fixture("partials/sub-partial.css");

    // Spurious add, then a change that must be the first refresh.
    recorder.emit(WatchEvent::Added(partial.clone()));
    recorder.emit(WatchEvent::Changed(sub_partial));
    host.wait_for_refresh().await;
    assert_eq!(host.refreshes(), 1);

    // Delete then re-create: both refresh.
    recorder.emit(WatchEvent::Removed(partial.clone()));
    host.wait_for_refresh().await;
    recorder.emit(WatchEvent::Added(partial.clone()));
    host.wait_for_refresh().await;
    assert_eq!(host.refreshes(), 3);

    let output = logs.contents();
    assert!(output.contains(&format!("Deleted file \"{}\".", partial.display())));
    assert_eq!(
        output
            .matches(&format!("Added file \"{}\".", partial.display()))
            .count(),
        1,
        "{output}"
    );
}

#[tokio::test]
async fn close_is_idempotent_and_stops_tracking() {
    let host = RecordingHost::watching(&[fixture_str("with-partial.css")]);
    let (pre, recorder) =
        preprocessor_with(PreprocessorSettings::default(), host, Arc::new(FakeChain::new()));

    pre.close();
    pre.close();
    assert!(!pre.has_watcher());

    let css = pre
        .process(
            &fixture_source("with-partial.css"),
            &mut FileDescriptor::new(fixture("with-partial.css")),
        )
        .await
        .expect("still compiles");
    assert!(css.contains(".partial"));
    assert!(recorder.watch_calls().is_empty());
    assert!(pre.indexed_dependencies().is_empty());
}

#[tokio::test]
async fn concurrent_compiles_keep_index_and_watcher_in_sync() {
    let sources: Vec<String> = (0..4).map(|i| fixture_str(&format!("parent-{i}.css"))).collect();
    let host = RecordingHost::watching(&sources);
    let (pre, _recorder) =
        preprocessor_with(PreprocessorSettings::default(), host, Arc::new(FakeChain::new()));

    let compile = |source: &str, content: &'static str| {
        let pre = &pre;
        let source = source.to_string();
        async move {
            let mut file = FileDescriptor::new(source);
            pre.process(content, &mut file).await
        }
    };

    let (a, b, c, d) = with_timeout(async {
        tokio::join!(
            compile(&sources[0], "@import 'partials/partial';\n"),
            compile(&sources[1], "@import 'partials/partial-alt';\n"),
            compile(&sources[2], "@import 'partials/sub-partial';\n"),
            compile(&sources[0], "@import 'partials/partial-alt';\n"),
        )
    })
    .await;
    for result in [a, b, c, d] {
        assert!(result.is_ok());
    }

    assert_eq!(pre.indexed_dependencies(), pre.watched_paths());
    // Whichever run of parent-0 finished last decides its set; partial-alt
    // and sub-partial are referenced by the other parents regardless.
    let watched = pre.watched_paths();
    assert!(watched.contains(&fixture("partials/partial-alt.css")));
    assert!(watched.contains(&fixture("partials/sub-partial.css")));
}

#[tokio::test]
async fn parent_locks_are_released_with_their_last_user() {
    use stylewatch::engine::ParentLocks;

    let locks = Arc::new(ParentLocks::new());
    let a = fixture("basic.css");
    let b = fixture("with-partial.css");

    let held = locks.acquire(&a).await;
    let other = locks.acquire(&b).await;
    assert_eq!(locks.len(), 2);

    let waiter = tokio::spawn({
        let locks = Arc::clone(&locks);
        let a = a.clone();
        async move {
            let _guard = locks.acquire(&a).await;
        }
    });
    tokio::task::yield_now().await;

    // The waiter keeps the entry alive after the holder lets go.
    drop(held);
    assert_eq!(locks.len(), 2);
    with_timeout(waiter).await.expect("waiter finishes");
    assert_eq!(locks.len(), 1);

    drop(other);
    assert!(locks.is_empty());

    // Processing through the engine leaves nothing behind either.
    let pre = Preprocessor::new(
        PreprocessorSettings::default(),
        PreprocessorSettings::default(),
        RecordingHost::new(false, Vec::new()),
        Arc::new(FakeChain::new()),
    )
    .expect("preprocessor builds");
    pre.process(&fixture_source("basic.css"), &mut FileDescriptor::new(&a))
        .await
        .expect("compiles");
    assert_eq!(pre.pending_parents(), 0);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn notify_backend_reports_dependency_edits() {
    use std::fs;

    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().expect("canonical tempdir");
    let main = root.join("main.css");
    let dep = root.join("dep.css");
    fs::write(&main, "@import 'dep';\n").unwrap();
    fs::write(&dep, ".dep { color: red; }\n").unwrap();

    let host = RecordingHost::watching(&[main.to_string_lossy()]);
    let pre = Preprocessor::new(
        PreprocessorSettings::default(),
        PreprocessorSettings::default(),
        host.clone() as Arc<dyn Host>,
        Arc::new(FakeChain::new()),
    )
    .expect("preprocessor with notify backend");

    pre.process("@import 'dep';\n", &mut FileDescriptor::new(&main))
        .await
        .expect("compiles");
    assert_eq!(pre.watched_paths(), vec![dep.clone()]);

    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::write(&dep, ".dep { color: blue; }\n").unwrap();
    host.wait_for_refresh().await;
    assert!(host.refreshes() >= 1);

    pre.close();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn atomic_save_of_a_dependency_refreshes_host() {
    use std::fs;

    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().expect("canonical tempdir");
    let main = root.join("main.css");
    let dep = root.join("dep.css");
    fs::write(&main, "@import 'dep';\n").unwrap();
    fs::write(&dep, ".dep { color: red; }\n").unwrap();

    let host = RecordingHost::watching(&[main.to_string_lossy()]);
    let pre = Preprocessor::new(
        PreprocessorSettings::default(),
        PreprocessorSettings::default(),
        host.clone() as Arc<dyn Host>,
        Arc::new(FakeChain::new()),
    )
    .expect("preprocessor with notify backend");

    pre.process("@import 'dep';\n", &mut FileDescriptor::new(&main))
        .await
        .expect("compiles");
    assert_eq!(pre.watched_paths(), vec![dep.clone()]);

    // Write a sibling temp file and rename it over the dependency.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let swap = root.join(".dep.css.swp");
    fs::write(&swap, ".dep { color: blue; }\n").unwrap();
    fs::rename(&swap, &dep).unwrap();

    host.wait_for_refresh().await;
    assert!(host.refreshes() >= 1);

    pre.close();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn notify_backend_retries_a_directory_that_appears_later() {
    use std::fs;

    use stylewatch::watch::{NotifyBackend, WatchBackend};
    use tokio::sync::mpsc;

    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().expect("canonical tempdir");
    let later = root.join("later");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut backend = NotifyBackend::spawn(tx).expect("notify backend");

    assert!(backend.watch(&[later.join("a.css")]).is_err());

    fs::create_dir(&later).unwrap();
    backend
        .watch(&[later.join("b.css")])
        .expect("directory exists now");

    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::write(later.join("b.css"), ".b {}\n").unwrap();

    let event = with_timeout(rx.recv()).await.expect("backend still alive");
    assert_eq!(event.path(), later.join("b.css"));
    // Never reported removed, so the create is a change.
    assert!(matches!(event, WatchEvent::Changed(_)), "{event:?}");

    backend
        .unwatch(&[later.join("a.css"), later.join("b.css")])
        .expect("only b's directory is released");
}
