// src/transform/runner.rs

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, warn};

use crate::engine::LOG_TARGET;
use crate::watch::path_utils::absolutize;

use super::options::{MapOption, MapSettings};
use super::{Message, Transform, TransformError, TransformOptions, TransformOutput, sourcemap};

/// What the preprocessor gets back from one successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// Final text, with the source map embedded when one was requested.
    pub css: String,
    /// Parsed source map, only when requested and produced.
    pub map: Option<Value>,
    /// Absolute dependency paths, de-duplicated, in declaration order.
    pub dependencies: Vec<PathBuf>,
}

/// Drives a [`Transform`] chain for one file at a time.
pub struct TransformRunner {
    chain: Arc<dyn Transform>,
    options: TransformOptions,
}

impl fmt::Debug for TransformRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRunner")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TransformRunner {
    /// `options` should already be layered (see [`TransformOptions::layered`]).
    pub fn new(chain: Arc<dyn Transform>, options: TransformOptions) -> Self {
        Self { chain, options }
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Fresh copy of the options for one invocation on `source`.
    ///
    /// Any map request is forced to a separate (non-inline) map so the runner
    /// controls the final embedding, and `from`/`to` point at the file.
    pub fn prepare_options(&self, source: &Path) -> TransformOptions {
        let mut options = self.options.clone();
        if options.wants_map() {
            options.map = Some(MapOption::Settings(MapSettings { inline: false }));
        }
        let source = absolutize(source);
        options.from = Some(source.clone());
        options.to = Some(source);
        options
    }

    /// Run the chain on `content`.
    ///
    /// Failures are logged once and returned unchanged.
    pub async fn run(&self, content: &str, source: &Path) -> Result<RunOutput, TransformError> {
        let options = self.prepare_options(source);
        let wants_map = options.wants_map();

        let output = match self.chain.process(content, options).await {
            Ok(output) => output,
            Err(err) => {
                error!(
                    target: LOG_TARGET,
                    name = %err.name,
                    file = %source.display(),
                    line = err.line,
                    "{}\n  at {}:{}",
                    err.message,
                    source.display(),
                    err.line_label()
                );
                return Err(err);
            }
        };

        self.finish(output, source, wants_map)
    }

    fn finish(
        &self,
        output: TransformOutput,
        source: &Path,
        wants_map: bool,
    ) -> Result<RunOutput, TransformError> {
        for message in &output.messages {
            if let Message::Warning { text, line } = message {
                warn!(target: LOG_TARGET, file = %source.display(), line = *line, "{text}");
            }
        }

        let dependencies = collect_dependencies(&output);

        let map = if wants_map { output.map } else { None };
        let css = match &map {
            Some(map) => sourcemap::embed(&output.css, map).map_err(|e| {
                TransformError::new("SourceMapError", e.to_string()).with_file(source)
            })?,
            None => output.css,
        };

        Ok(RunOutput {
            css,
            map,
            dependencies,
        })
    }
}

/// Absolute, de-duplicated `dependency` files of `output`.
pub fn collect_dependencies(output: &TransformOutput) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    output
        .dependency_files()
        .map(|file| absolutize(file))
        .filter(|file| seen.insert(file.clone()))
        .collect()
}
