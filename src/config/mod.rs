// src/config/mod.rs

//! Configuration loading and validation for stylewatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate patterns and preprocessor settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, PreprocessorSection, RawConfigFile, TransformPathRule};
pub use validate::validate_config;
