// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

pub use crate::transform::TransformError;

#[derive(Error, Debug)]
pub enum StylewatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StylewatchError>;
