use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::store::{read_versioned_array, write_versioned_array};

/// A connected broker account. `status` flips between `connected` and
/// `disconnected`; the record itself survives disconnection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingAccount {
    pub account_id: String,
    pub connector_id: String,
    pub provider_account_id: String,
    pub mode: String,
    pub label: String,
    pub allowed_symbols: Vec<String>,
    pub status: String,
    pub connected_at: Option<DateTime<Utc>>,
    pub disconnected_at: Option<DateTime<Utc>>,
}

/// Caller-supplied identity of an account being connected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccountSpec {
    pub account_id: String,
    pub connector_id: String,
    pub provider_account_id: String,
    pub mode: String,
    pub label: String,
    #[serde(default)]
    pub allowed_symbols: Vec<String>,
}

/// Disk-backed account registry. `connect` is an idempotent upsert.
pub struct AccountRegistry {
    accounts: BTreeMap<String, TradingAccount>,
    state_path: Option<PathBuf>,
}

impl AccountRegistry {
    pub fn new(state_path: Option<impl AsRef<Path>>) -> Self {
        let state_path = state_path.map(|p| p.as_ref().to_path_buf());
        let mut registry = Self {
            accounts: BTreeMap::new(),
            state_path,
        };
        registry.load();
        registry
    }

    pub fn connect(&mut self, spec: AccountSpec, now: DateTime<Utc>) -> Result<TradingAccount> {
        let account = match self.accounts.get_mut(&spec.account_id) {
            Some(existing) => {
                existing.connector_id = spec.connector_id;
                existing.provider_account_id = spec.provider_account_id;
                existing.mode = spec.mode;
                existing.label = spec.label;
                existing.allowed_symbols = spec.allowed_symbols;
                existing.status = "connected".to_string();
                existing.connected_at = Some(now);
                existing.disconnected_at = None;
                existing.clone()
            }
            None => {
                let account = TradingAccount {
                    account_id: spec.account_id.clone(),
                    connector_id: spec.connector_id,
                    provider_account_id: spec.provider_account_id,
                    mode: spec.mode,
                    label: spec.label,
                    allowed_symbols: spec.allowed_symbols,
                    status: "connected".to_string(),
                    connected_at: Some(now),
                    disconnected_at: None,
                };
                self.accounts.insert(spec.account_id, account.clone());
                account
            }
        };
        self.save()?;
        Ok(account)
    }

    pub fn disconnect(
        &mut self,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TradingAccount>> {
        let Some(account) = self.accounts.get_mut(account_id) else {
            return Ok(None);
        };
        account.status = "disconnected".to_string();
        account.disconnected_at = Some(now);
        let account = account.clone();
        self.save()?;
        Ok(Some(account))
    }

    pub fn get(&self, account_id: &str) -> Option<&TradingAccount> {
        self.accounts.get(account_id)
    }

    pub fn list(&self) -> Vec<&TradingAccount> {
        self.accounts.values().collect()
    }

    fn load(&mut self) {
        let Some(ref path) = self.state_path else {
            return;
        };
        for raw in read_versioned_array(path, "accounts") {
            match serde_json::from_value::<TradingAccount>(raw) {
                Ok(account) => {
                    self.accounts.insert(account.account_id.clone(), account);
                }
                Err(err) => warn!(error = %err, "skipping malformed account record"),
            }
        }
    }

    fn save(&self) -> Result<()> {
        let Some(ref path) = self.state_path else {
            return Ok(());
        };
        let items = self
            .accounts
            .values()
            .map(|a| serde_json::to_value(a).expect("account serialization must not fail"))
            .collect();
        write_versioned_array(path, "accounts", items)
    }
}
