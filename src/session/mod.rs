// src/session/mod.rs

//! Standalone host for the preprocessor.
//!
//! Plays the test-runner role for the `stylewatch` binary: lists the
//! configured sources, feeds them through the [`Preprocessor`](crate::engine::Preprocessor),
//! writes the results to an output directory and rebuilds on refresh.

pub mod build;
pub mod host;

pub use build::{BuildSession, BuildSummary};
pub use host::ConfigHost;
