//! Append-only operator audit log. Writes JSON Lines (one entry per line).
//!
//! Every security-relevant gateway action appends one self-contained record
//! before its response goes out: the append fsyncs, so a reported success is
//! durable. Optional hash chain: each entry can include hashPrev + hashSelf,
//! making any in-place edit or deletion detectable by `verify_hash_chain`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// AuditEntry
// ---------------------------------------------------------------------------

/// One audit record. `trace_id` is the originating request id, so an
/// operator can correlate a log line back to the session frame that caused
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub audit_id: String,
    pub ts: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub trace_id: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_self: Option<String>,
}

// ---------------------------------------------------------------------------
// AuditStore
// ---------------------------------------------------------------------------

/// Append-only audit writer over `<data>/audit.jsonl`.
pub struct AuditStore {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
}

impl AuditStore {
    /// Creates the store and ensures the parent directory exists.
    pub fn new(data_dir: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .with_context(|| format!("create_dir_all {:?}", data_dir))?;

        let path = data_dir.join("audit.jsonl");
        let mut store = Self {
            path,
            hash_chain,
            last_hash: None,
        };
        if hash_chain {
            store.last_hash = store.read_last_hash()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. The line is flushed and synced before this returns,
    /// so callers may report success as soon as it does.
    pub fn append(
        &mut self,
        actor: &str,
        action: &str,
        trace_id: &str,
        data: Value,
    ) -> Result<AuditEntry> {
        let mut entry = AuditEntry {
            audit_id: format!("audit_{}", short_hex_id()),
            ts: Utc::now(),
            actor: actor.to_string(),
            action: action.to_string(),
            trace_id: trace_id.to_string(),
            data,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            entry.hash_prev = self.last_hash.clone();
            let self_hash = compute_entry_hash(&entry)?;
            entry.hash_self = Some(self_hash.clone());
            self.last_hash = Some(self_hash);
        }

        let line = canonical_json_line(&entry)?;
        append_line(&self.path, &line)?;

        Ok(entry)
    }

    /// All entries in insertion order. Blank lines are skipped.
    pub fn read_all(&self) -> Result<Vec<AuditEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("read audit log {:?}", self.path))?;

        let mut entries = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(trimmed)
                .with_context(|| format!("parse audit entry at line {}", i + 1))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Recover the chain tail after a restart so new entries keep linking.
    fn read_last_hash(&self) -> Result<Option<String>> {
        let entries = self.read_all()?;
        Ok(entries.last().and_then(|e| e.hash_self.clone()))
    }
}

fn short_hex_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Write a single line to file (with trailing newline) and sync it. Durable
/// before the caller's response is sent.
fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(line.as_bytes())
        .context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    f.sync_data().context("sync audit line failed")?;
    Ok(())
}

/// Canonicalize by sorting keys recursively and emitting compact JSON.
/// One entry == one JSON line.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit entry failed")?;
    let sorted = sort_keys(&raw);
    serde_json::to_string(&sorted).context("json stringify failed")
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

// ---------------------------------------------------------------------------
// Hash chain
// ---------------------------------------------------------------------------

/// Hash is computed from canonical JSON of the entry WITHOUT hashSelf (to
/// avoid self-reference).
pub fn compute_entry_hash(entry: &AuditEntry) -> Result<String> {
    let mut clone = entry.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Result of hash chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// The entire chain is valid.
    Valid { lines: usize },
    /// The chain is broken at the given line.
    Broken { line: usize, reason: String },
}

/// Verify the hash chain integrity of an audit log file.
pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Same logic as [`verify_hash_chain`] but over in-memory JSONL content.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut line_count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let entry: AuditEntry = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit entry at line {}", i + 1))?;

        line_count += 1;

        // 1. hashPrev must match the previous entry's hashSelf.
        if entry.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hashPrev mismatch: expected {:?}, got {:?}",
                    prev_hash, entry.hash_prev
                ),
            });
        }

        // 2. hashSelf must be correct for this entry's content.
        if let Some(ref claimed_hash) = entry.hash_self {
            let recomputed = compute_entry_hash(&entry)?;
            if *claimed_hash != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!(
                        "hashSelf mismatch: claimed {}, recomputed {}",
                        claimed_hash, recomputed
                    ),
                });
            }
        }

        prev_hash = entry.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: line_count })
}
