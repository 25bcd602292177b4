//! aegis-risk
//!
//! Pre-trade risk evaluation and the process-wide emergency-stop gate.
//!
//! - `evaluate` is a pure function over (intent, policy, snapshot): it emits
//!   every violation, not just the first, and never touches IO or the clock.
//! - `RiskControlState` is the kill-switch consulted before every trade
//!   placement; when stopped it produces a synthetic
//!   `EMERGENCY_STOP_ACTIVE` violation regardless of policy.

mod control;
mod engine;
mod types;

pub use control::{EmergencyAction, RiskControlState, RiskControlStatus};
pub use engine::evaluate;
pub use types::{
    AccountRiskSnapshot, RiskDecision, RiskPolicy, RiskViolation, TradeIntent, ViolationCode,
};
