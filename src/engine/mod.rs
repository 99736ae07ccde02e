// src/engine/mod.rs

//! The preprocessor engine.
//!
//! Per file the host hands in, the engine:
//! - derives the output path ([`path`]),
//! - runs the transform chain,
//! - in watch mode, reconciles the file's dependencies against the previous
//!   run and registers/unregisters them with the watcher,
//! - turns watcher events into host refreshes.
//!
//! The host side of the contract lives in [`host`].

/// `tracing` target used by every preprocessor log line.
pub const LOG_TARGET: &str = "stylewatch::preprocessor";

pub mod host;
pub mod locks;
pub mod path;
pub mod preprocessor;

pub use host::Host;
pub use locks::ParentLocks;
pub use path::{DefaultPathTransformer, PathTransformer, RegexPathTransformer};
pub use preprocessor::{Preprocessor, PreprocessorSettings};
