use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One file the host asks the preprocessor to compile.
///
/// The host owns the descriptor. The preprocessor only writes
/// `output_path` (always, before the transform runs) and `source_map`
/// (only when a map was requested and produced).
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    source_path: PathBuf,
    /// Logical path the compiled content is served under.
    pub output_path: PathBuf,
    /// Parsed source map of the last successful compile, if any.
    pub source_map: Option<Value>,
}

impl FileDescriptor {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        Self {
            output_path: source_path.clone(),
            source_path,
            source_map: None,
        }
    }

    /// Original path of the file, as supplied by the host.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

/// Entry of the host's file list.
///
/// Mirrors the host config:
///
/// ```toml
/// [[files]]
/// pattern = "styles/*.css"
/// watched = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePattern {
    pub pattern: String,

    /// Whether changes to files matched by this entry re-run the host.
    #[serde(default = "default_watched")]
    pub watched: bool,
}

impl FilePattern {
    pub fn new(pattern: impl Into<String>, watched: bool) -> Self {
        Self {
            pattern: pattern.into(),
            watched,
        }
    }
}

fn default_watched() -> bool {
    true
}
