use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{AgentQueue, QueueSnapshot};

/// Persists every agent queue into one versioned JSON file.
///
/// Loads are lenient: a missing file, unreadable JSON, or a malformed
/// `queues` object all produce an empty map, and individually malformed
/// queue entries are skipped (with a diagnostic) rather than poisoning the
/// rest. Saves are atomic (write-to-temp + rename) so a crash mid-write
/// leaves the previous snapshot intact.
pub struct QueueSnapshotStore {
    state_path: PathBuf,
}

impl QueueSnapshotStore {
    pub fn new(state_path: impl AsRef<Path>) -> Result<Self> {
        let state_path = state_path.as_ref().to_path_buf();
        if let Some(parent) = state_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create_dir_all {:?}", parent))?;
        }
        Ok(Self { state_path })
    }

    pub fn path(&self) -> &Path {
        &self.state_path
    }

    pub fn load(&self) -> BTreeMap<String, AgentQueue> {
        let mut queues = BTreeMap::new();

        if !self.state_path.exists() {
            return queues;
        }

        let raw = match fs::read_to_string(&self.state_path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = ?self.state_path, error = %err, "queue snapshot unreadable; starting empty");
                return queues;
            }
        };

        let payload: Value = match serde_json::from_str(&raw) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(path = ?self.state_path, error = %err, "queue snapshot is not valid JSON; starting empty");
                return queues;
            }
        };

        let Some(entries) = payload.get("queues").and_then(Value::as_object) else {
            warn!(path = ?self.state_path, "queue snapshot has no queues object; starting empty");
            return queues;
        };

        for (agent_id, entry) in entries {
            let snapshot: QueueSnapshot = match serde_json::from_value(entry.clone()) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(agent_id = %agent_id, error = %err, "skipping malformed queue entry");
                    continue;
                }
            };
            match AgentQueue::from_snapshot(snapshot) {
                Ok(queue) => {
                    queues.insert(agent_id.clone(), queue);
                }
                Err(err) => {
                    warn!(agent_id = %agent_id, error = %err, "skipping invalid queue entry");
                }
            }
        }

        queues
    }

    pub fn save(&self, queues: &BTreeMap<String, AgentQueue>) -> Result<()> {
        let mut entries = serde_json::Map::new();
        for (agent_id, queue) in queues {
            let snapshot = serde_json::to_value(queue.snapshot())
                .context("serialize queue snapshot failed")?;
            entries.insert(agent_id.clone(), snapshot);
        }

        let payload = json!({
            "version": 1,
            "queues": Value::Object(entries),
        });
        let text = serde_json::to_string(&payload).context("json stringify failed")?;

        // Atomic replace: a crash between write and rename leaves the old
        // snapshot in place.
        let tmp_path = self.state_path.with_extension("json.tmp");
        fs::write(&tmp_path, text)
            .with_context(|| format!("write queue snapshot {:?}", tmp_path))?;
        fs::rename(&tmp_path, &self.state_path)
            .with_context(|| format!("rename queue snapshot into {:?}", self.state_path))?;
        Ok(())
    }
}
