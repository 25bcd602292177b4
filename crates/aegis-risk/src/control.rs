//! Process-wide emergency-stop state.
//!
//! # Invariants
//!
//! - Two states only: ARMED (`emergency_stop_active == false`) and STOPPED.
//! - `activate` is the sole path to STOPPED and `resume` the sole path back;
//!   action counters are never reset by either transition.
//! - All logic is deterministic: the caller supplies `now`, there is no
//!   clock access here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::{RiskViolation, ViolationCode};

/// The emergency actions an operator can trigger alongside the stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmergencyAction {
    PauseTrading,
    CancelAll,
    CloseAll,
    DisableLive,
}

impl EmergencyAction {
    pub const ALL: [EmergencyAction; 4] = [
        EmergencyAction::PauseTrading,
        EmergencyAction::CancelAll,
        EmergencyAction::CloseAll,
        EmergencyAction::DisableLive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyAction::PauseTrading => "pauseTrading",
            EmergencyAction::CancelAll => "cancelAll",
            EmergencyAction::CloseAll => "closeAll",
            EmergencyAction::DisableLive => "disableLive",
        }
    }
}

/// Snapshot of the kill-switch, as returned by `risk.status` and carried in
/// `event.risk.emergencyStop`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskControlStatus {
    pub emergency_stop_active: bool,
    pub last_action: Option<EmergencyAction>,
    pub last_reason: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub action_counts: BTreeMap<EmergencyAction, u64>,
}

/// The kill-switch itself. Consulted by the gateway before every
/// `trades.place`.
#[derive(Clone, Debug)]
pub struct RiskControlState {
    emergency_stop_active: bool,
    last_action: Option<EmergencyAction>,
    last_reason: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    action_counts: BTreeMap<EmergencyAction, u64>,
}

impl Default for RiskControlState {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskControlState {
    pub fn new() -> Self {
        let mut action_counts = BTreeMap::new();
        for action in EmergencyAction::ALL {
            action_counts.insert(action, 0);
        }
        Self {
            emergency_stop_active: false,
            last_action: None,
            last_reason: None,
            updated_at: None,
            action_counts,
        }
    }

    /// `true` when trade placement is blocked.
    pub fn is_stopped(&self) -> bool {
        self.emergency_stop_active
    }

    pub fn status(&self) -> RiskControlStatus {
        RiskControlStatus {
            emergency_stop_active: self.emergency_stop_active,
            last_action: self.last_action,
            last_reason: self.last_reason.clone(),
            updated_at: self.updated_at,
            action_counts: self.action_counts.clone(),
        }
    }

    /// Engage the stop. Increments the action counter and records reason
    /// and timestamp.
    pub fn activate(
        &mut self,
        action: EmergencyAction,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> RiskControlStatus {
        self.emergency_stop_active = true;
        self.last_action = Some(action);
        self.last_reason = reason;
        self.updated_at = Some(now);
        *self.action_counts.entry(action).or_insert(0) += 1;
        self.status()
    }

    /// Return to ARMED. Counters are preserved; the reason is overwritten
    /// only when the operator supplies one.
    pub fn resume(&mut self, reason: Option<String>, now: DateTime<Utc>) -> RiskControlStatus {
        self.emergency_stop_active = false;
        if reason.is_some() {
            self.last_reason = reason;
        }
        self.updated_at = Some(now);
        self.status()
    }

    /// The synthetic violation injected into a trade decision while the
    /// stop is engaged. Carries the last action and timestamp as evidence.
    pub fn emergency_stop_violation(&self) -> RiskViolation {
        RiskViolation::new(
            ViolationCode::EmergencyStopActive,
            "Emergency stop is active; trading is blocked.",
        )
        .with_detail(
            "lastAction",
            json!(self.last_action.map(|a| a.as_str().to_string())),
        )
        .with_detail("updatedAt", json!(self.updated_at))
    }
}
