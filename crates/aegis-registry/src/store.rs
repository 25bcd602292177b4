//! Shared versioned-file persistence for the registries.
//!
//! Files have the shape `{"version": 1, "<collection>": [record, ...]}`.
//! Reads never fail the caller: anything unreadable degrades to an empty
//! collection (individual bad records are dropped by the caller).
//! Writes go through a temp file + rename so a crash mid-write cannot
//! truncate the previous state.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tracing::warn;

pub(crate) fn read_versioned_array(path: &Path, collection: &str) -> Vec<Value> {
    if !path.exists() {
        return Vec::new();
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = ?path, error = %err, "registry file unreadable; starting empty");
            return Vec::new();
        }
    };

    let payload: Value = match serde_json::from_str(&raw) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(path = ?path, error = %err, "registry file is not valid JSON; starting empty");
            return Vec::new();
        }
    };

    match payload.get(collection).and_then(Value::as_array) {
        Some(items) => items.clone(),
        None => {
            warn!(path = ?path, collection, "registry file has no collection array; starting empty");
            Vec::new()
        }
    }
}

pub(crate) fn write_versioned_array(path: &Path, collection: &str, items: Vec<Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
    }

    let mut payload = serde_json::Map::new();
    payload.insert("version".to_string(), json!(1));
    payload.insert(collection.to_string(), Value::Array(items));
    let text =
        serde_json::to_string(&Value::Object(payload)).context("json stringify failed")?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, text).with_context(|| format!("write registry file {:?}", tmp_path))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("rename registry file into {:?}", path))?;
    Ok(())
}
