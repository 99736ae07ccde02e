// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::engine::RegexPathTransformer;
use crate::errors::{Result, StylewatchError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StylewatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let transform_path = match &raw.preprocessor.transform_path {
            Some(rule) => Some(RegexPathTransformer::new(&rule.pattern, rule.replacement.clone())?),
            None => None,
        };
        Ok(ConfigFile::new_unchecked(raw, transform_path))
    }
}

/// Run every check on a raw config without building a [`ConfigFile`].
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_files(cfg)?;
    validate_file_patterns(cfg)?;
    validate_preprocessor(cfg)?;
    Ok(())
}

fn ensure_has_files(cfg: &RawConfigFile) -> Result<()> {
    if cfg.files.is_empty() {
        return Err(StylewatchError::ConfigError(
            "config must contain at least one [[files]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_file_patterns(cfg: &RawConfigFile) -> Result<()> {
    for entry in &cfg.files {
        if entry.pattern.trim().is_empty() {
            return Err(StylewatchError::ConfigError(
                "[[files]] entry has an empty pattern".to_string(),
            ));
        }
        Glob::new(&entry.pattern).map_err(|e| {
            StylewatchError::InvalidPattern(format!("files pattern {:?}: {e}", entry.pattern))
        })?;
    }
    Ok(())
}

fn validate_preprocessor(cfg: &RawConfigFile) -> Result<()> {
    if let Some(cmd) = &cfg.preprocessor.command {
        if cmd.trim().is_empty() {
            return Err(StylewatchError::ConfigError(
                "[preprocessor].command must not be empty".to_string(),
            ));
        }
    }
    if let Some(out_dir) = &cfg.out_dir {
        if out_dir.as_os_str().is_empty() {
            return Err(StylewatchError::ConfigError(
                "out_dir must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}
