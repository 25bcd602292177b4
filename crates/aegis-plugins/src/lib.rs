//! aegis-plugins
//!
//! Plugin discovery results are resolved against an allow/deny
//! configuration and named slots. Resolution is deterministic and collects
//! human-readable diagnostics instead of failing: a misconfigured slot just
//! stays unbound.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A discovered plugin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRecord {
    pub plugin_id: String,
    pub kind: String,
}

/// Allow/deny lists plus slot bindings from configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PluginConfig {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
}

/// The resolver's output, as surfaced by `plugins.status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPlugins {
    pub enabled_plugins: BTreeSet<String>,
    pub active_slots: BTreeMap<String, String>,
    pub diagnostics: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicatePluginError {
    pub plugin_id: String,
}

impl std::fmt::Display for DuplicatePluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "plugin '{}' already registered", self.plugin_id)
    }
}

impl std::error::Error for DuplicatePluginError {}

pub struct PluginRegistry {
    config: PluginConfig,
    plugins: BTreeMap<String, PluginRecord>,
}

impl PluginRegistry {
    pub fn new(config: PluginConfig) -> Self {
        Self {
            config,
            plugins: BTreeMap::new(),
        }
    }

    pub fn register_plugin(&mut self, plugin: PluginRecord) -> Result<(), DuplicatePluginError> {
        if self.plugins.contains_key(&plugin.plugin_id) {
            return Err(DuplicatePluginError {
                plugin_id: plugin.plugin_id,
            });
        }
        self.plugins.insert(plugin.plugin_id.clone(), plugin);
        Ok(())
    }

    /// Resolve the enabled set and slot bindings.
    ///
    /// An empty allow list enables everything not denied; a non-empty allow
    /// list is an exact whitelist. Slots bind only when the referenced
    /// plugin exists, is enabled, and has the expected kind for that slot.
    pub fn resolve(&self) -> ResolvedPlugins {
        let mut diagnostics = Vec::new();
        let allow: BTreeSet<&str> = self.config.allow.iter().map(String::as_str).collect();
        let deny: BTreeSet<&str> = self.config.deny.iter().map(String::as_str).collect();

        let enabled_plugins: BTreeSet<String> = self
            .plugins
            .keys()
            .filter(|id| allow.is_empty() || allow.contains(id.as_str()))
            .filter(|id| !deny.contains(id.as_str()))
            .cloned()
            .collect();

        let slot_kind_map: BTreeMap<&str, &str> = BTreeMap::from([("memory", "memory")]);

        let mut active_slots = BTreeMap::new();
        for (slot_name, slot_plugin_id) in &self.config.slots {
            let Some(plugin) = self.plugins.get(slot_plugin_id) else {
                diagnostics.push(format!(
                    "Slot '{slot_name}' references unknown plugin '{slot_plugin_id}'"
                ));
                continue;
            };

            if !enabled_plugins.contains(slot_plugin_id) {
                diagnostics.push(format!(
                    "Slot '{slot_name}' plugin '{slot_plugin_id}' is not enabled"
                ));
                continue;
            }

            if let Some(expected_kind) = slot_kind_map.get(slot_name.as_str()) {
                if &plugin.kind != expected_kind {
                    diagnostics.push(format!(
                        "Slot '{slot_name}' expects kind '{expected_kind}' but got '{}'",
                        plugin.kind
                    ));
                    continue;
                }
            }

            active_slots.insert(slot_name.clone(), slot_plugin_id.clone());
        }

        ResolvedPlugins {
            enabled_plugins,
            active_slots,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, kind: &str) -> PluginRecord {
        PluginRecord {
            plugin_id: id.to_string(),
            kind: kind.to_string(),
        }
    }

    fn registry(config: PluginConfig) -> PluginRegistry {
        let mut registry = PluginRegistry::new(config);
        registry.register_plugin(record("sqlite_fts", "memory")).expect("register");
        registry.register_plugin(record("candle_sim", "feed")).expect("register");
        registry
    }

    #[test]
    fn empty_allow_enables_everything_minus_deny() {
        let resolved = registry(PluginConfig {
            deny: vec!["candle_sim".to_string()],
            ..PluginConfig::default()
        })
        .resolve();

        assert!(resolved.enabled_plugins.contains("sqlite_fts"));
        assert!(!resolved.enabled_plugins.contains("candle_sim"));
    }

    #[test]
    fn allow_list_is_an_exact_whitelist() {
        let resolved = registry(PluginConfig {
            allow: vec!["candle_sim".to_string()],
            ..PluginConfig::default()
        })
        .resolve();

        assert_eq!(resolved.enabled_plugins.len(), 1);
        assert!(resolved.enabled_plugins.contains("candle_sim"));
    }

    #[test]
    fn memory_slot_binds_matching_kind() {
        let resolved = registry(PluginConfig {
            slots: BTreeMap::from([("memory".to_string(), "sqlite_fts".to_string())]),
            ..PluginConfig::default()
        })
        .resolve();

        assert_eq!(
            resolved.active_slots.get("memory"),
            Some(&"sqlite_fts".to_string())
        );
        assert!(resolved.diagnostics.is_empty());
    }

    #[test]
    fn slot_diagnostics_cover_unknown_disabled_and_wrong_kind() {
        let resolved = registry(PluginConfig {
            deny: vec!["sqlite_fts".to_string()],
            slots: BTreeMap::from([
                ("memory".to_string(), "sqlite_fts".to_string()),
                ("other".to_string(), "ghost".to_string()),
            ]),
            ..PluginConfig::default()
        })
        .resolve();

        assert!(resolved.active_slots.is_empty());
        assert_eq!(resolved.diagnostics.len(), 2);
        assert!(resolved.diagnostics.iter().any(|d| d.contains("not enabled")));
        assert!(resolved.diagnostics.iter().any(|d| d.contains("unknown plugin")));

        let wrong_kind = registry(PluginConfig {
            slots: BTreeMap::from([("memory".to_string(), "candle_sim".to_string())]),
            ..PluginConfig::default()
        })
        .resolve();
        assert!(wrong_kind
            .diagnostics
            .iter()
            .any(|d| d.contains("expects kind 'memory'")));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = PluginRegistry::new(PluginConfig::default());
        registry.register_plugin(record("sqlite_fts", "memory")).expect("first");
        let err = registry
            .register_plugin(record("sqlite_fts", "memory"))
            .expect_err("duplicate");
        assert_eq!(err.plugin_id, "sqlite_fts");
    }
}
