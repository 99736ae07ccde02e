// src/transform/mod.rs

//! Transform chain layer.
//!
//! The stylesheet compiler itself is an external collaborator. This module
//! defines the contract the preprocessor talks to ([`Transform`]) and the
//! wrapper that drives it per file ([`TransformRunner`]):
//!
//! - [`options`] holds the layered, per-call cloned [`TransformOptions`].
//! - [`runner`] normalizes options, embeds source maps, extracts dependencies
//!   and logs failures.
//! - [`sourcemap`] handles `sourceMappingURL` comments.
//! - [`identity`] is the empty chain (content passes through unchanged).
//! - [`command`] runs an external process as the chain.

pub mod command;
pub mod error;
pub mod identity;
pub mod options;
pub mod runner;
pub mod sourcemap;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use command::CommandTransform;
pub use error::TransformError;
pub use identity::IdentityTransform;
pub use options::{MapOption, MapSettings, TransformOptions};
pub use runner::{RunOutput, TransformRunner};

/// Boxed future returned by [`Transform::process`].
pub type TransformFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransformOutput, TransformError>> + Send + 'a>>;

/// A stylesheet transform chain.
///
/// Implementations receive their own copy of the options and may mutate it
/// freely; nothing they do to it is visible to other invocations.
pub trait Transform: Send + Sync {
    fn process<'a>(&'a self, content: &'a str, options: TransformOptions) -> TransformFuture<'a>;
}

/// Result of one chain invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformOutput {
    pub css: String,

    /// Source map as a JSON object, when one was generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<Value>,

    /// Metadata the chain attached to the result.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl TransformOutput {
    pub fn new(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            ..Self::default()
        }
    }

    /// Files declared as `dependency` messages, in declaration order.
    pub fn dependency_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.messages.iter().filter_map(|m| match m {
            Message::Dependency { file, .. } => Some(file),
            _ => None,
        })
    }
}

/// A metadata message emitted by the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// The output was derived from `file` (e.g. an imported partial).
    Dependency {
        file: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<PathBuf>,
    },
    Warning {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
    },
    #[serde(other)]
    Other,
}
