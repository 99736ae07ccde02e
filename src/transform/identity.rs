// src/transform/identity.rs

use std::path::Path;

use serde_json::{Value, json};

use super::{Transform, TransformFuture, TransformOptions, TransformOutput};

/// The empty plugin chain: content passes through unchanged.
///
/// When a map is requested, a line-identity v3 source map is produced so the
/// output still points back at the original file.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl Transform for IdentityTransform {
    fn process<'a>(&'a self, content: &'a str, options: TransformOptions) -> TransformFuture<'a> {
        Box::pin(async move {
            let mut output = TransformOutput::new(content);
            if options.wants_map() {
                let from = options.from.as_deref().unwrap_or(Path::new("stdin"));
                let to = options.to.as_deref().unwrap_or(from);
                output.map = Some(identity_map(from, to, content));
            }
            Ok(output)
        })
    }
}

/// v3 source map mapping every line of `css` onto the same line of `from`.
pub fn identity_map(from: &Path, to: &Path, css: &str) -> Value {
    json!({
        "version": 3,
        "sources": [file_name(from)],
        "names": [],
        "mappings": identity_mappings(css),
        "file": file_name(to),
        "sourcesContent": [css],
    })
}

/// One `AAAA`-style segment per line: column 0 of line N maps to column 0 of
/// line N in source 0.
pub fn identity_mappings(css: &str) -> String {
    let lines = css.split('\n').count();
    let mut mappings = String::with_capacity(lines * 5);
    mappings.push_str("AAAA");
    for _ in 1..lines {
        mappings.push_str(";AACA");
    }
    mappings
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
