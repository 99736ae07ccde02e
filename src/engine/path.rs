// src/engine/path.rs

//! Output (logical) path policies.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::errors::{Result, StylewatchError};

/// Maps an original file path to the path the compiled output is served
/// under. Must be a pure function of its argument.
///
/// Any `Fn(&Path) -> PathBuf` closure is a transformer.
pub trait PathTransformer: Send + Sync {
    fn transform(&self, original: &Path) -> PathBuf;
}

impl<F> PathTransformer for F
where
    F: Fn(&Path) -> PathBuf + Send + Sync,
{
    fn transform(&self, original: &Path) -> PathBuf {
        self(original)
    }
}

/// Swap the final extension for `.css` (or append it when there is none).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPathTransformer;

impl PathTransformer for DefaultPathTransformer {
    fn transform(&self, original: &Path) -> PathBuf {
        original.with_extension("css")
    }
}

/// Regex rewrite of the whole path, configured as
/// `transform_path = { pattern = '\.txt$', replacement = ".css" }`.
///
/// `replacement` may use `$1`/`${name}` capture references.
#[derive(Clone)]
pub struct RegexPathTransformer {
    pattern: Regex,
    replacement: String,
}

impl fmt::Debug for RegexPathTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexPathTransformer")
            .field("pattern", &self.pattern.as_str())
            .field("replacement", &self.replacement)
            .finish()
    }
}

impl RegexPathTransformer {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            StylewatchError::InvalidPattern(format!("transform_path pattern {pattern:?}: {e}"))
        })?;
        Ok(Self {
            pattern,
            replacement: replacement.into(),
        })
    }
}

impl PathTransformer for RegexPathTransformer {
    fn transform(&self, original: &Path) -> PathBuf {
        let original = original.to_string_lossy();
        PathBuf::from(
            self.pattern
                .replace_all(&original, self.replacement.as_str())
                .into_owned(),
        )
    }
}
