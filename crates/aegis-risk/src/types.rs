use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Violation codes surfaced in risk decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    SymbolNotAllowed,
    MaxVolumeExceeded,
    MaxConcurrentPositions,
    MaxDailyLoss,
    StopLossRequired,
    /// Synthetic: injected by the gateway when the kill-switch is engaged.
    EmergencyStopActive,
}

/// An operator-proposed trade, before risk evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TradeIntent {
    pub account_id: String,
    pub symbol: String,
    pub action: String,
    pub side: String,
    pub volume: f64,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
}

impl TradeIntent {
    /// Field-level constraints the wire schema cannot express.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("accountId", &self.account_id),
            ("symbol", &self.symbol),
            ("action", &self.action),
            ("side", &self.side),
        ] {
            if value.trim().is_empty() {
                return Err(format!("intent.{name} must be non-empty"));
            }
        }
        if !(self.volume > 0.0) {
            return Err("intent.volume must be > 0".to_string());
        }
        Ok(())
    }
}

/// Per-account risk rules applied to each intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RiskPolicy {
    pub allowed_symbols: Vec<String>,
    pub max_volume: f64,
    pub max_concurrent_positions: u32,
    pub max_daily_loss: f64,
    #[serde(default = "default_require_stop_loss")]
    pub require_stop_loss: bool,
}

fn default_require_stop_loss() -> bool {
    true
}

impl RiskPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.max_volume > 0.0) {
            return Err("policy.maxVolume must be > 0".to_string());
        }
        if self.max_concurrent_positions < 1 {
            return Err("policy.maxConcurrentPositions must be >= 1".to_string());
        }
        if !(self.max_daily_loss > 0.0) {
            return Err("policy.maxDailyLoss must be > 0".to_string());
        }
        Ok(())
    }
}

/// Point-in-time account state fed to the evaluator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccountRiskSnapshot {
    pub open_positions: u32,
    pub daily_pnl: f64,
}

/// A single failed check, with machine code and operator-facing evidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskViolation {
    pub code: ViolationCode,
    pub message: String,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl RiskViolation {
    pub fn new(code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// The evaluator's verdict. `allowed` holds exactly when `violations` is
/// empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskDecision {
    pub allowed: bool,
    pub violations: Vec<RiskViolation>,
}

impl RiskDecision {
    pub fn from_violations(violations: Vec<RiskViolation>) -> Self {
        Self {
            allowed: violations.is_empty(),
            violations,
        }
    }
}
