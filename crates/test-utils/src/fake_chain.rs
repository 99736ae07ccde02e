//! A tiny stylesheet "compiler" used as the transform chain in tests.
//!
//! Understands just enough syntax to exercise the preprocessor:
//!
//! - `@import 'name';` inlines `name` (or `name.css`), resolved against the
//!   importing file's directory and then the search paths, and reports it as
//!   a `dependency` message. Nested imports are reported in pre-order.
//! - `@define-mixin NAME { body }` defines a single-line mixin.
//! - `@mixin NAME;` expands it, or fails with `Undefined mixin NAME`.
//! - `@warn "text";` emits a warning message.
//!
//! Every other line is copied through unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use stylewatch::transform::identity::identity_map;
use stylewatch::transform::{
    Message, Transform, TransformError, TransformFuture, TransformOptions, TransformOutput,
};

#[derive(Default)]
pub struct FakeChain {
    search_paths: Vec<PathBuf>,
    calls: AtomicUsize,
    seen_options: Mutex<Vec<TransformOptions>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Additional directories `@import` looks in.
    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    /// How many times `process` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Options received by every call, in order.
    pub fn seen_options(&self) -> Vec<TransformOptions> {
        self.seen_options.lock().unwrap().clone()
    }

    /// Compile `content` as if it were `from`, without any preprocessor
    /// involvement.
    pub fn compile(
        &self,
        content: &str,
        from: &Path,
    ) -> Result<TransformOutput, TransformError> {
        let mut state = CompileState {
            search_paths: &self.search_paths,
            mixins: HashMap::new(),
            messages: Vec::new(),
            stack: vec![from.to_path_buf()],
        };
        let css = state.compile(content, from)?;
        Ok(TransformOutput {
            css,
            map: None,
            messages: state.messages,
        })
    }
}

impl Transform for FakeChain {
    fn process<'a>(&'a self, content: &'a str, options: TransformOptions) -> TransformFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_options.lock().unwrap().push(options.clone());

        Box::pin(async move {
            let from = options
                .from
                .clone()
                .unwrap_or_else(|| PathBuf::from("stdin.css"));
            let mut output = self.compile(content, &from)?;
            if options.wants_map() {
                let to = options.to.clone().unwrap_or_else(|| from.clone());
                output.map = Some(identity_map(&from, &to, &output.css));
            }
            Ok(output)
        })
    }
}

struct CompileState<'a> {
    search_paths: &'a [PathBuf],
    mixins: HashMap<String, String>,
    messages: Vec<Message>,
    stack: Vec<PathBuf>,
}

impl CompileState<'_> {
    fn compile(&mut self, content: &str, file: &Path) -> Result<String, TransformError> {
        let mut out = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;
            let trimmed = line.trim();
            let column = (line.len() - line.trim_start().len()) as u32 + 1;

            if let Some(name) = directive(trimmed, "@import") {
                let name = unquote(name);
                let resolved = self.resolve(name, file).ok_or_else(|| {
                    syntax_error(format!("Failed to find '{name}'"), line_no, column, file)
                })?;
                if self.stack.contains(&resolved) {
                    continue;
                }
                self.messages.push(Message::Dependency {
                    file: resolved.clone(),
                    parent: Some(file.to_path_buf()),
                });
                let nested = std::fs::read_to_string(&resolved).map_err(|e| {
                    syntax_error(e.to_string(), line_no, column, file)
                })?;
                self.stack.push(resolved.clone());
                let css = self.compile(&nested, &resolved)?;
                self.stack.pop();
                out.push(css);
            } else if let Some(rest) = trimmed.strip_prefix("@define-mixin ") {
                let (name, body) = rest.split_once('{').ok_or_else(|| {
                    syntax_error("Malformed mixin definition", line_no, column, file)
                })?;
                let body = body.trim().trim_end_matches('}').trim();
                self.mixins.insert(name.trim().to_string(), body.to_string());
            } else if let Some(name) = directive(trimmed, "@mixin") {
                let body = self.mixins.get(name).ok_or_else(|| {
                    syntax_error(format!("Undefined mixin {name}"), line_no, column, file)
                })?;
                let indent = &line[..line.len() - line.trim_start().len()];
                out.push(format!("{indent}{body}"));
            } else if let Some(text) = directive(trimmed, "@warn") {
                self.messages.push(Message::Warning {
                    text: unquote(text).to_string(),
                    line: Some(line_no),
                });
            } else {
                out.push(line.to_string());
            }
        }

        Ok(out.join("\n"))
    }

    fn resolve(&self, name: &str, importer: &Path) -> Option<PathBuf> {
        let base = importer.parent().map(Path::to_path_buf).unwrap_or_default();
        let candidates = [name.to_string(), format!("{name}.css")];
        std::iter::once(&base)
            .chain(self.search_paths.iter())
            .flat_map(|dir| candidates.iter().map(move |c| dir.join(c)))
            .find(|path| path.is_file())
    }
}

/// `@kw arg;` -> `arg`.
fn directive<'s>(line: &'s str, keyword: &str) -> Option<&'s str> {
    let rest = line.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim().trim_end_matches(';').trim())
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c| c == '\'' || c == '"')
}

fn syntax_error(message: impl Into<String>, line: u32, column: u32, file: &Path) -> TransformError {
    TransformError::new("CssSyntaxError", message)
        .with_position(line, column)
        .with_file(file)
}
