#![allow(dead_code)]

use stylewatch::config::{ConfigFile, RawConfigFile, TransformPathRule};
use stylewatch::transform::TransformOptions;
use stylewatch::types::FilePattern;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn auto_watch(mut self, val: bool) -> Self {
        self.config.auto_watch = val;
        self
    }

    pub fn with_file(mut self, pattern: &str) -> Self {
        self.config.files.push(FilePattern::new(pattern, true));
        self
    }

    pub fn with_unwatched_file(mut self, pattern: &str) -> Self {
        self.config.files.push(FilePattern::new(pattern, false));
        self
    }

    pub fn out_dir(mut self, dir: &str) -> Self {
        self.config.out_dir = Some(dir.into());
        self
    }

    pub fn command(mut self, cmd: &str) -> Self {
        self.config.preprocessor.command = Some(cmd.to_string());
        self
    }

    pub fn transform_path(mut self, pattern: &str, replacement: &str) -> Self {
        self.config.preprocessor.transform_path = Some(TransformPathRule {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        });
        self
    }

    pub fn options(mut self, options: TransformOptions) -> Self {
        self.config.preprocessor.options = options;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Options with source maps switched on.
pub fn source_map_options() -> TransformOptions {
    TransformOptions {
        source_map: Some(true),
        ..TransformOptions::default()
    }
}
