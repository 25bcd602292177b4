//! aegis-config
//!
//! Configuration loading for the gateway: JSON-with-comments on disk,
//! `${VAR}` environment interpolation in string values (missing variables
//! become empty strings), strict typed validation (unknown fields are
//! rejected), deep-merge patching with re-validation, and a canonical
//! SHA-256 hash so operators can compare configs across restarts.

mod jsonc;
mod schema;
mod types;

use anyhow::Context;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub use jsonc::strip_jsonc_comments;
pub use schema::config_schema;
pub use types::{
    default_config, AppConfig, FeedCandlesConfig, FeedPriceTicksConfig, FeedsConfig,
    GatewayAuthConfig, GatewayConfig,
};

/// Why a config failed to load or validate.
#[derive(Debug)]
pub enum ConfigError {
    Missing(std::path::PathBuf),
    Parse(String),
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(path) => write!(f, "config file does not exist: {path:?}"),
            ConfigError::Parse(msg) => write!(f, "failed to parse config: {msg}"),
            ConfigError::Validation(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a JSONC config file: strip comments, parse, interpolate env vars,
/// validate against the typed schema.
pub fn load_config(config_path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = config_path.as_ref();
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }

    let raw_text = fs::read_to_string(path)
        .with_context(|| format!("read config {path:?}"))
        .map_err(|err| ConfigError::Parse(format!("{err:#}")))?;

    let stripped = strip_jsonc_comments(&raw_text);
    let parsed: Value =
        serde_json::from_str(&stripped).map_err(|err| ConfigError::Parse(err.to_string()))?;

    let interpolated = interpolate_env(&parsed);
    validate_config_value(interpolated)
}

/// Validate an already-assembled JSON value into a typed config.
pub fn validate_config_value(value: Value) -> Result<AppConfig, ConfigError> {
    let config: AppConfig =
        serde_json::from_value(value).map_err(|err| ConfigError::Validation(err.to_string()))?;
    config.validate().map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Deep-merge a patch into the current config, then re-validate. The
/// current config is untouched when the patched result fails validation.
pub fn apply_patch(current: &AppConfig, patch: &Value) -> Result<AppConfig, ConfigError> {
    if !patch.is_object() {
        return Err(ConfigError::Validation("patch must be an object".to_string()));
    }
    let mut merged =
        serde_json::to_value(current).expect("config serialization must not fail");
    deep_merge(&mut merged, patch.clone());
    validate_config_value(merged)
}

/// Deep-merge: objects merge recursively; arrays replaced; scalars
/// overwritten.
pub fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

/// Canonical (recursively key-sorted, compact) JSON of a config, hashed
/// with SHA-256.
pub fn config_hash(config: &AppConfig) -> String {
    let raw = serde_json::to_value(config).expect("config serialization must not fail");
    let canonical = canonicalize_json(&raw);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Substitute `${VAR}` occurrences in every string value. A missing
/// variable substitutes as the empty string; malformed references are left
/// verbatim.
pub fn interpolate_env(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_env(v)))
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.iter().map(interpolate_env).collect()),
        Value::String(s) => Value::String(interpolate_env_str(s)),
        other => other.clone(),
    }
}

fn interpolate_env_str(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if is_env_name(&after[..end]) => {
                let name = &after[..end];
                output.push_str(&std::env::var(name).unwrap_or_default());
                rest = &after[end + 1..];
            }
            _ => {
                // Not a well-formed reference; keep the literal `${`.
                output.push_str("${");
                rest = after;
            }
        }
    }
    output.push_str(rest);
    output
}

fn is_env_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
