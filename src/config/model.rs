// src/config/model.rs

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::engine::{PreprocessorSettings, RegexPathTransformer};
use crate::transform::TransformOptions;
use crate::types::FilePattern;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// auto_watch = true
/// out_dir = "dist"
///
/// [[files]]
/// pattern = "styles/*.css"
/// watched = true
///
/// [preprocessor]
/// command = "node postcss-bridge.js"
/// transform_path = { pattern = '\.txt$', replacement = ".css" }
///
/// [preprocessor.options]
/// source_map = true
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Watch mode: track dependencies and recompile on change.
    #[serde(default)]
    pub auto_watch: bool,

    /// Where compiled files are written, relative to the config file.
    #[serde(default)]
    pub out_dir: Option<PathBuf>,

    /// Files to compile, relative to the config file.
    #[serde(default)]
    pub files: Vec<FilePattern>,

    /// `[preprocessor]` section.
    #[serde(default)]
    pub preprocessor: PreprocessorSection,
}

/// `[preprocessor]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreprocessorSection {
    /// Shell command acting as the transform chain. When absent, files pass
    /// through unchanged.
    #[serde(default)]
    pub command: Option<String>,

    /// Output path rewrite; defaults to swapping the extension for `.css`.
    #[serde(default)]
    pub transform_path: Option<TransformPathRule>,

    /// Options forwarded to the transform chain.
    #[serde(default)]
    pub options: TransformOptions,
}

/// `transform_path = { pattern = "...", replacement = "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransformPathRule {
    pub pattern: String,
    pub replacement: String,
}

/// Validated configuration.
///
/// Construct through `ConfigFile::try_from(raw)` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub auto_watch: bool,
    pub out_dir: Option<PathBuf>,
    pub files: Vec<FilePattern>,
    pub preprocessor: PreprocessorSection,
    transform_path: Option<RegexPathTransformer>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        raw: RawConfigFile,
        transform_path: Option<RegexPathTransformer>,
    ) -> Self {
        Self {
            auto_watch: raw.auto_watch,
            out_dir: raw.out_dir,
            files: raw.files,
            preprocessor: raw.preprocessor,
            transform_path,
        }
    }

    /// Output directory, defaulting to `dist`.
    pub fn out_dir(&self) -> PathBuf {
        self.out_dir.clone().unwrap_or_else(|| PathBuf::from("dist"))
    }

    /// Host-level preprocessor settings described by this config.
    pub fn preprocessor_settings(&self) -> PreprocessorSettings {
        PreprocessorSettings {
            options: self.preprocessor.options.clone(),
            transform_path: self
                .transform_path
                .clone()
                .map(|t| Arc::new(t) as Arc<dyn crate::engine::PathTransformer>),
        }
    }
}
