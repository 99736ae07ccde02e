// src/transform/error.rs

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised by the transform chain.
///
/// Carries the position of the failure so it can be reported as
/// `<file>:<line>`. The preprocessor hands it back to the host unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{name}: {message}")]
pub struct TransformError {
    #[serde(default = "default_name")]
    pub name: String,

    pub message: String,

    /// 1-based line of the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// 1-based column of the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,

    /// File the failure occurred in (may be an imported partial).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_name() -> String {
    "TransformError".to_string()
}

impl TransformError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            line: None,
            column: None,
            file: None,
        }
    }

    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    /// `<line>` or `?` when the chain did not report one.
    pub fn line_label(&self) -> String {
        self.line
            .map(|l| l.to_string())
            .unwrap_or_else(|| "?".to_string())
    }
}
