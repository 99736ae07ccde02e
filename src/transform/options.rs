// src/transform/options.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options handed to the transform chain.
///
/// The well-known fields are typed; everything else (plugin settings, parser
/// flags, ...) is kept as JSON in `extra` and forwarded verbatim.
///
/// Options are assembled from three layers, in increasing precedence:
/// engine defaults, the host config (`[preprocessor.options]`) and the
/// custom args of a preprocessor instance. See [`TransformOptions::layered`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOptions {
    #[serde(default, alias = "source_map", skip_serializing_if = "Option::is_none")]
    pub source_map: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MapOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<PathBuf>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `map = true` or `map = { inline = false }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MapOption {
    Enabled(bool),
    Settings(MapSettings),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSettings {
    #[serde(default)]
    pub inline: bool,
}

impl TransformOptions {
    /// Engine defaults: source maps off.
    pub fn engine_defaults() -> Self {
        Self {
            source_map: Some(false),
            ..Self::default()
        }
    }

    /// `engine defaults < host config < custom args`.
    pub fn layered(config: &TransformOptions, args: &TransformOptions) -> Self {
        Self::engine_defaults().merged(config).merged(args)
    }

    /// Return `self` overlaid with `over`: set fields of `over` win, and
    /// nested JSON objects in `extra` are merged key by key.
    pub fn merged(mut self, over: &TransformOptions) -> Self {
        if over.source_map.is_some() {
            self.source_map = over.source_map;
        }
        if over.map.is_some() {
            self.map = over.map.clone();
        }
        if over.from.is_some() {
            self.from = over.from.clone();
        }
        if over.to.is_some() {
            self.to = over.to.clone();
        }
        for (key, value) in &over.extra {
            match self.extra.get_mut(key) {
                Some(existing) => merge_value(existing, value),
                None => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
        self
    }

    /// True when either `source_map` or `map` asks for a source map.
    pub fn wants_map(&self) -> bool {
        let map = match &self.map {
            Some(MapOption::Enabled(enabled)) => *enabled,
            Some(MapOption::Settings(_)) => true,
            None => false,
        };
        self.source_map.unwrap_or(false) || map
    }
}

/// Deep-merge `over` into `base`. Objects merge per key; anything else in
/// `over` replaces `base`.
pub fn merge_value(base: &mut Value, over: &Value) {
    match (base, over) {
        (Value::Object(base), Value::Object(over)) => {
            for (key, value) in over {
                match base.get_mut(key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, over) => *base = over.clone(),
    }
}
