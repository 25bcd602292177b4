//! Shared runtime state for the gateway.
//!
//! Every process-global store lives here behind its own lock; sessions
//! receive `Arc<AppState>` and the broadcast bus fans server-initiated
//! events out to all connected sessions.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::warn;

use aegis_audit::AuditStore;
use aegis_config::AppConfig;
use aegis_connector::{BrokerConnector, HttpConnectorTransport};
use aegis_execution::TradeExecutionService;
use aegis_feeds::{FeedHookPipeline, FeedService};
use aegis_hooks::HookRuntime;
use aegis_marketplace::{CopyTradeMapper, CopyTradeMappingResult, CopyTradeSignal, FollowerConstraints};
use aegis_memory::MemoryIndex;
use aegis_plugins::{PluginConfig, PluginRecord, PluginRegistry};
use aegis_queues::{AgentQueue, AgentRequest, QueueDecision, QueueSettings, QueueSnapshotStore};
use aegis_registry::{AccountRegistry, AgentRegistry, DeviceRegistry};
use aegis_risk::RiskControlState;

// ---------------------------------------------------------------------------
// BusEvent — broadcast to every connected session
// ---------------------------------------------------------------------------

/// A server-initiated event not tied to any one session's request.
#[derive(Clone, Debug)]
pub struct BusEvent {
    pub event: String,
    pub payload: Value,
}

// ---------------------------------------------------------------------------
// QueueHub — all agent queues plus their snapshot store
// ---------------------------------------------------------------------------

/// Owns every agent queue and persists the whole set on each mutation.
pub struct QueueHub {
    queues: BTreeMap<String, AgentQueue>,
    store: QueueSnapshotStore,
}

impl QueueHub {
    pub fn new(store: QueueSnapshotStore) -> Self {
        let queues = store.load();
        Self { queues, store }
    }

    /// Admit a request, creating the agent's queue lazily, and persist.
    pub fn enqueue(&mut self, request: AgentRequest, now_ms: i64) -> Result<QueueDecision> {
        let queue = self
            .queues
            .entry(request.agent_id.clone())
            .or_insert_with(|| AgentQueue::new(QueueSettings::default()));
        let decision = queue.enqueue(request, now_ms);
        self.store.save(&self.queues)?;
        Ok(decision)
    }

    /// Queue status payload for dashboards. An agent without a queue reads
    /// as an empty default queue; nothing is created.
    pub fn status_payload(&self, agent_id: &str) -> Value {
        match self.queues.get(agent_id) {
            Some(queue) => json!({
                "agentId": agent_id,
                "mode": queue.settings().mode,
                "cap": queue.settings().cap,
                "activeRequestId": queue.active_request().map(|r| r.request_id.clone()),
                "pendingCount": queue.pending_len(),
                "collectCount": queue.collect_len(),
            }),
            None => {
                let defaults = QueueSettings::default();
                json!({
                    "agentId": agent_id,
                    "mode": defaults.mode,
                    "cap": defaults.cap,
                    "activeRequestId": Value::Null,
                    "pendingCount": 0,
                    "collectCount": 0,
                })
            }
        }
    }

    /// Flush every due collect buffer; each synthesized batch is admitted
    /// into its queue's run lane. Returns the agent ids whose queues
    /// changed.
    pub fn flush_due(&mut self, now_ms: i64) -> Result<Vec<String>> {
        let mut changed = Vec::new();
        for (agent_id, queue) in self.queues.iter_mut() {
            if let Some(batch) = queue.flush_collect(now_ms) {
                queue.admit_direct(batch);
                changed.push(agent_id.clone());
            }
        }
        if !changed.is_empty() {
            self.store.save(&self.queues)?;
        }
        Ok(changed)
    }
}

// ---------------------------------------------------------------------------
// CopyTradeHub — per-account mappers plus the process-wide pause flag
// ---------------------------------------------------------------------------

pub struct CopyTradeHub {
    pub paused: bool,
    mappers: BTreeMap<String, CopyTradeMapper>,
}

impl CopyTradeHub {
    pub fn new() -> Self {
        Self {
            paused: false,
            mappers: BTreeMap::new(),
        }
    }

    /// Map a signal for an account. The account's dedupe memory persists
    /// across calls; constraints are refreshed from the caller each time.
    pub fn preview(
        &mut self,
        account_id: &str,
        constraints: FollowerConstraints,
        signal: &CopyTradeSignal,
        now: DateTime<Utc>,
    ) -> CopyTradeMappingResult {
        let mapper = self
            .mappers
            .entry(account_id.to_string())
            .or_insert_with(|| CopyTradeMapper::new(constraints.clone()));
        mapper.set_constraints(constraints);
        mapper.map_signal(signal, account_id, now)
    }

    pub fn status_payload(&self) -> Value {
        let accounts: Vec<Value> = self
            .mappers
            .iter()
            .map(|(account_id, mapper)| {
                json!({
                    "accountId": account_id,
                    "processedCount": mapper.processed_count(),
                })
            })
            .collect();
        json!({"paused": self.paused, "accounts": accounts})
    }
}

impl Default for CopyTradeHub {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub config: RwLock<AppConfig>,
    pub bus: broadcast::Sender<BusEvent>,

    pub audit: Mutex<AuditStore>,
    pub risk_control: RwLock<RiskControlState>,
    pub queues: Mutex<QueueHub>,
    pub accounts: RwLock<AccountRegistry>,
    pub agents: RwLock<AgentRegistry>,
    pub devices: RwLock<DeviceRegistry>,
    pub feeds: RwLock<FeedService>,
    pub plugins: RwLock<PluginRegistry>,
    pub memory: MemoryIndex,
    pub execution: TradeExecutionService,
    pub hook_runtime: Arc<HookRuntime>,
    pub pipeline: RwLock<FeedHookPipeline>,
    pub copytrade: Mutex<CopyTradeHub>,
}

impl AppState {
    /// Build every store from config and the data directory layout:
    /// `<data>/audit.jsonl`, `<data>/state/*.json`, `<data>/memory.db`,
    /// and per-agent workspaces under `agents_dir`.
    pub fn new(
        config: AppConfig,
        data_dir: impl AsRef<Path>,
        agents_dir: impl AsRef<Path>,
    ) -> Result<Arc<Self>> {
        let data_dir = data_dir.as_ref();
        let state_dir = data_dir.join("state");

        let audit = AuditStore::new(data_dir, true).context("build audit store")?;
        let queue_store = QueueSnapshotStore::new(state_dir.join("agent_queues.json"))
            .context("build queue snapshot store")?;

        let now = Utc::now();
        let mut accounts = AccountRegistry::new(Some(state_dir.join("accounts.json")));
        for spec in &config.accounts {
            // Seed configured accounts; reconnects refresh their records.
            if let Err(err) = accounts.connect(spec.clone(), now) {
                warn!(account_id = %spec.account_id, error = %err, "seeding configured account failed");
            }
        }

        let agents = AgentRegistry::new(Some(state_dir.join("agents.json")), agents_dir.as_ref())
            .context("build agent registry")?;
        let devices = DeviceRegistry::new(Some(state_dir.join("devices.json")));

        let plugins = build_plugin_registry(config.plugins.clone());
        let memory = MemoryIndex::new(data_dir.join("memory.db")).context("build memory index")?;

        let execution = match connector_from_env()? {
            Some(connector) => TradeExecutionService::with_connector(connector),
            None => TradeExecutionService::new(),
        };

        let hook_runtime = Arc::new(HookRuntime::new());
        let pipeline = FeedHookPipeline::new(Arc::clone(&hook_runtime));

        let (bus, _rx) = broadcast::channel::<BusEvent>(1024);

        Ok(Arc::new(Self {
            started_at: now,
            config: RwLock::new(config),
            bus,
            audit: Mutex::new(audit),
            risk_control: RwLock::new(RiskControlState::new()),
            queues: Mutex::new(QueueHub::new(queue_store)),
            accounts: RwLock::new(accounts),
            agents: RwLock::new(agents),
            devices: RwLock::new(devices),
            feeds: RwLock::new(FeedService::new()),
            plugins: RwLock::new(plugins),
            memory,
            execution,
            hook_runtime,
            pipeline: RwLock::new(pipeline),
            copytrade: Mutex::new(CopyTradeHub::new()),
        }))
    }

    /// Broadcast a server-initiated event to every connected session.
    pub fn broadcast(&self, event: &str, payload: Value) {
        let _ = self.bus.send(BusEvent {
            event: event.to_string(),
            payload,
        });
    }
}

/// Register the built-in plugin set against the configured allow/deny and
/// slots. Discovery of external plugins would feed the same registry.
fn build_plugin_registry(config: PluginConfig) -> PluginRegistry {
    let mut registry = PluginRegistry::new(config);
    let builtin = [
        PluginRecord {
            plugin_id: "sqlite_fts".to_string(),
            kind: "memory".to_string(),
        },
        PluginRecord {
            plugin_id: "candle_sim".to_string(),
            kind: "feed".to_string(),
        },
    ];
    for plugin in builtin {
        if let Err(err) = registry.register_plugin(plugin) {
            warn!(error = %err, "builtin plugin registration failed");
        }
    }
    registry
}

/// Optional broker connector, configured via `AEGISD_CONNECTOR_URL` (+
/// `AEGISD_CONNECTOR_TOKEN`). Without it execution runs in paper mode.
fn connector_from_env() -> Result<Option<BrokerConnector>> {
    let Ok(base_url) = std::env::var("AEGISD_CONNECTOR_URL") else {
        return Ok(None);
    };
    if base_url.trim().is_empty() {
        return Ok(None);
    }
    let token = std::env::var("AEGISD_CONNECTOR_TOKEN").ok();
    let transport =
        HttpConnectorTransport::new(base_url, token).context("build connector transport")?;
    Ok(Some(BrokerConnector::new(Arc::new(transport))))
}

/// Resolved data directory for the daemon (`AEGISD_DATA`, default `data`).
pub fn data_dir_from_env() -> PathBuf {
    std::env::var("AEGISD_DATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Resolved agent workspace base (`AEGISD_AGENTS_DIR`, default `agents`).
pub fn agents_dir_from_env() -> PathBuf {
    std::env::var("AEGISD_AGENTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("agents"))
}
