// tests/command_chain.rs
#![cfg(unix)]

mod common;
use crate::common::capture_logs;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;

use stylewatch::transform::{CommandTransform, TransformOptions, TransformRunner, sourcemap};
use stylewatch_test_utils::builders::source_map_options;

fn runner(cmd: &str, options: TransformOptions) -> TransformRunner {
    TransformRunner::new(Arc::new(CommandTransform::new(cmd)), options)
}

#[tokio::test]
async fn cat_echoes_the_request_back_as_output() {
    // The request's `css` field is a valid output on its own.
    let run = runner("cat", TransformOptions::default())
        .run(".a { color: red; }", Path::new("/project/a.css"))
        .await
        .expect("cat succeeds");

    assert_eq!(run.css, ".a { color: red; }");
    assert!(run.dependencies.is_empty());
    assert_eq!(run.map, None);
}

#[tokio::test]
async fn dependency_messages_are_collected() {
    let cmd = r#"cat >/dev/null; printf '%s' '{"css":".out{}","messages":[{"type":"dependency","file":"/project/_vars.css","parent":"/project/a.css"},{"type":"dependency","file":"/project/_vars.css"},{"type":"asset","file":"/project/logo.png"},{"type":"dependency","file":"/project/_mixins.css"}]}'"#;
    let run = runner(cmd, TransformOptions::default())
        .run("@import 'vars';", Path::new("/project/a.css"))
        .await
        .expect("command succeeds");

    assert_eq!(run.css, ".out{}");
    assert_eq!(
        run.dependencies,
        vec![
            PathBuf::from("/project/_vars.css"),
            PathBuf::from("/project/_mixins.css"),
        ]
    );
}

#[tokio::test]
async fn map_from_the_chain_is_embedded() {
    let cmd = r#"cat >/dev/null; printf '%s' '{"css":".m{}","map":{"version":3,"sources":["m.css"],"names":[],"mappings":"AAAA"}}'"#;
    let run = runner(cmd, source_map_options())
        .run(".m{}", Path::new("/project/m.css"))
        .await
        .expect("command succeeds");

    let map = run.map.expect("map requested and produced");
    assert_eq!(map["mappings"], json!("AAAA"));
    assert!(run.css.starts_with(".m{}\n//# sourceMappingURL="));
    assert_eq!(sourcemap::extract(&run.css), Some(map));
}

#[tokio::test]
async fn structured_failure_is_returned_as_is() {
    let (logs, _guard) = capture_logs();

    let cmd = r#"cat >/dev/null; printf '%s' '{"name":"CssSyntaxError","message":"Unknown word","line":3,"column":5,"file":"/project/bad.css"}'; exit 1"#;
    let err = runner(cmd, TransformOptions::default())
        .run("a {", Path::new("/project/bad.css"))
        .await
        .expect_err("command fails");

    assert_eq!(err.name, "CssSyntaxError");
    assert_eq!(err.message, "Unknown word");
    assert_eq!(err.line, Some(3));
    assert_eq!(err.column, Some(5));
    assert_eq!(err.file, Some(PathBuf::from("/project/bad.css")));

    // Logged once at error level; the debug spawn line echoes the command.
    let errors: Vec<String> = logs
        .lines_containing("Unknown word")
        .into_iter()
        .filter(|line| line.contains("ERROR"))
        .collect();
    assert_eq!(errors.len(), 1, "{}", logs.contents());
    assert!(logs.contents().contains("/project/bad.css:3"));
}

#[tokio::test]
async fn unstructured_failure_carries_stderr() {
    let err = runner("echo boom >&2; exit 2", TransformOptions::default())
        .run("", Path::new("/project/x.css"))
        .await
        .expect_err("command fails");

    assert_eq!(err.name, "CommandError");
    assert!(err.message.contains("exited with 2"), "{}", err.message);
    assert!(err.message.contains("boom"), "{}", err.message);
    assert_eq!(err.file, Some(PathBuf::from("/project/x.css")));
    assert_eq!(err.line_label(), "?");
}

#[tokio::test]
async fn garbage_output_is_a_command_error() {
    let err = runner("cat >/dev/null; echo not-json", TransformOptions::default())
        .run(".a{}", Path::new("/project/a.css"))
        .await
        .expect_err("unparsable output");

    assert_eq!(err.name, "CommandError");
    assert!(err.message.contains("invalid output"), "{}", err.message);
}

#[tokio::test]
async fn command_runs_in_the_configured_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("out.json"), r#"{"css":"from-cwd"}"#).unwrap();

    let chain = CommandTransform::new("cat >/dev/null; cat out.json").with_cwd(dir.path());
    let run = TransformRunner::new(Arc::new(chain), TransformOptions::default())
        .run("", Path::new("/project/a.css"))
        .await
        .expect("command succeeds");

    assert_eq!(run.css, "from-cwd");
}
