// src/transform/sourcemap.rs

//! `sourceMappingURL` handling for compiled output.

use std::borrow::Cow;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde_json::Value;

/// Prefix of the data URI appended to compiled output.
pub const DATA_URI_PREFIX: &str = "data:application/json;charset=utf-8;base64,";

static MAPPING_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:/\*(?:\s*\r?\n(?://)?)?[#@] sourceMappingURL=[^\s'"]*\s*\*/|//[#@] sourceMappingURL=[^\s'"]*)\s*"#,
    )
    .expect("sourceMappingURL pattern is valid")
});

/// Remove every `sourceMappingURL` comment (block or line style).
pub fn strip_mapping_url(css: &str) -> Cow<'_, str> {
    MAPPING_URL.replace_all(css, "")
}

/// Base64 data URI for `map` (compact JSON).
pub fn data_uri(map: &Value) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(map)?;
    Ok(format!("{DATA_URI_PREFIX}{}", STANDARD.encode(json.as_bytes())))
}

/// Replace any existing annotation in `css` with an inline one for `map`.
pub fn embed(css: &str, map: &Value) -> Result<String, serde_json::Error> {
    let uri = data_uri(map)?;
    Ok(format!(
        "{}\n//# sourceMappingURL={uri}\n",
        strip_mapping_url(css)
    ))
}

/// Decode the map embedded by [`embed`], if `css` carries one.
pub fn extract(css: &str) -> Option<Value> {
    let start = css.rfind(DATA_URI_PREFIX)? + DATA_URI_PREFIX.len();
    let encoded = css[start..].split_whitespace().next()?;
    let bytes = STANDARD.decode(encoded).ok()?;
    serde_json::from_slice(&bytes).ok()
}
