use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::store::{read_versioned_array, write_versioned_array};
use crate::workspace::bootstrap_agent_workspace;

/// A registered trading agent and the workspace it operates in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingAgent {
    pub agent_id: String,
    pub label: String,
    pub status: String,
    pub workspace_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Disk-backed agent registry. `create` is an idempotent upsert that also
/// bootstraps the agent's workspace tree (existing files are never
/// overwritten).
pub struct AgentRegistry {
    agents: BTreeMap<String, TradingAgent>,
    state_path: Option<PathBuf>,
    workspace_base_dir: PathBuf,
}

impl AgentRegistry {
    pub fn new(
        state_path: Option<impl AsRef<Path>>,
        workspace_base_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let workspace_base_dir = workspace_base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&workspace_base_dir)?;

        let mut registry = Self {
            agents: BTreeMap::new(),
            state_path: state_path.map(|p| p.as_ref().to_path_buf()),
            workspace_base_dir,
        };
        registry.load();
        Ok(registry)
    }

    pub fn create(
        &mut self,
        agent_id: &str,
        label: &str,
        soul_template: &str,
        manual_template: &str,
        now: DateTime<Utc>,
    ) -> Result<TradingAgent> {
        let workspace_path = bootstrap_agent_workspace(
            &self.workspace_base_dir,
            agent_id,
            soul_template,
            manual_template,
        )?;

        let agent = match self.agents.get_mut(agent_id) {
            Some(existing) => {
                existing.label = label.to_string();
                existing.status = "ready".to_string();
                existing.workspace_path = workspace_path.display().to_string();
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let agent = TradingAgent {
                    agent_id: agent_id.to_string(),
                    label: label.to_string(),
                    status: "ready".to_string(),
                    workspace_path: workspace_path.display().to_string(),
                    created_at: now,
                    updated_at: now,
                };
                self.agents.insert(agent_id.to_string(), agent.clone());
                agent
            }
        };
        self.save()?;
        Ok(agent)
    }

    pub fn get(&self, agent_id: &str) -> Option<&TradingAgent> {
        self.agents.get(agent_id)
    }

    pub fn list(&self) -> Vec<&TradingAgent> {
        self.agents.values().collect()
    }

    pub fn workspace_base_dir(&self) -> &Path {
        &self.workspace_base_dir
    }

    fn load(&mut self) {
        let Some(ref path) = self.state_path else {
            return;
        };
        for raw in read_versioned_array(path, "agents") {
            match serde_json::from_value::<TradingAgent>(raw) {
                Ok(agent) => {
                    self.agents.insert(agent.agent_id.clone(), agent);
                }
                Err(err) => warn!(error = %err, "skipping malformed agent record"),
            }
        }
    }

    fn save(&self) -> Result<()> {
        let Some(ref path) = self.state_path else {
            return Ok(());
        };
        let items = self
            .agents
            .values()
            .map(|a| serde_json::to_value(a).expect("agent serialization must not fail"))
            .collect();
        write_versioned_array(path, "agents", items)
    }
}
