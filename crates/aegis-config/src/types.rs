use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use aegis_plugins::PluginConfig;
use aegis_registry::AccountSpec;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GatewayAuthConfig {
    pub mode: String,
    pub token: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub auth: GatewayAuthConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FeedCandlesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub poll_seconds_by_timeframe: BTreeMap<String, u64>,
}

impl Default for FeedCandlesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_seconds_by_timeframe: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FeedPriceTicksConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FeedsConfig {
    #[serde(default)]
    pub candles: FeedCandlesConfig,
    #[serde(default)]
    pub price_ticks: FeedPriceTicksConfig,
}

/// The full validated configuration tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub plugins: PluginConfig,
    #[serde(default)]
    pub accounts: Vec<AccountSpec>,
    #[serde(default)]
    pub feeds: FeedsConfig,
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Constraints the serde schema cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.gateway.host.trim().is_empty() {
            return Err("gateway.host must be non-empty".to_string());
        }
        if self.gateway.port < 1 {
            return Err("gateway.port must be in [1, 65535]".to_string());
        }
        if self.gateway.auth.mode.trim().is_empty() {
            return Err("gateway.auth.mode must be non-empty".to_string());
        }
        if self.gateway.auth.token.trim().is_empty() {
            return Err("gateway.auth.token must be non-empty".to_string());
        }
        for (index, account) in self.accounts.iter().enumerate() {
            for (name, value) in [
                ("accountId", &account.account_id),
                ("connectorId", &account.connector_id),
                ("providerAccountId", &account.provider_account_id),
                ("mode", &account.mode),
                ("label", &account.label),
            ] {
                if value.trim().is_empty() {
                    return Err(format!("accounts[{index}].{name} must be non-empty"));
                }
            }
        }
        Ok(())
    }
}

/// Built-in defaults used when no config file is supplied.
pub fn default_config() -> AppConfig {
    AppConfig {
        gateway: GatewayConfig {
            host: "0.0.0.0".to_string(),
            port: 18789,
            auth: GatewayAuthConfig {
                mode: "token".to_string(),
                token: std::env::var("GATEWAY_TOKEN").unwrap_or_else(|_| "dev-token".to_string()),
            },
        },
        plugins: PluginConfig {
            allow: Vec::new(),
            deny: Vec::new(),
            slots: BTreeMap::from([("memory".to_string(), "sqlite_fts".to_string())]),
        },
        accounts: Vec::new(),
        feeds: FeedsConfig {
            candles: FeedCandlesConfig {
                enabled: true,
                poll_seconds_by_timeframe: BTreeMap::from([
                    ("5m".to_string(), 45),
                    ("1h".to_string(), 180),
                ]),
            },
            price_ticks: FeedPriceTicksConfig { enabled: false },
        },
    }
}
