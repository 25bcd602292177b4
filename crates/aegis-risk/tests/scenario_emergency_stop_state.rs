//! Kill-switch scenarios: ARMED ↔ STOPPED transitions, counter
//! preservation, and the synthetic violation shape.

use aegis_risk::{EmergencyAction, RiskControlState, ViolationCode};
use chrono::{TimeZone, Utc};

#[test]
fn fresh_state_is_armed_with_zeroed_counters() {
    let state = RiskControlState::new();
    let status = state.status();

    assert!(!status.emergency_stop_active);
    assert!(status.last_action.is_none());
    assert!(status.updated_at.is_none());
    assert_eq!(status.action_counts.len(), 4);
    assert!(status.action_counts.values().all(|&c| c == 0));
}

#[test]
fn activate_sets_stopped_and_increments_counter() {
    let mut state = RiskControlState::new();
    let t0 = Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap();

    let status = state.activate(
        EmergencyAction::PauseTrading,
        Some("manual drill".to_string()),
        t0,
    );

    assert!(status.emergency_stop_active);
    assert!(state.is_stopped());
    assert_eq!(status.last_action, Some(EmergencyAction::PauseTrading));
    assert_eq!(status.last_reason.as_deref(), Some("manual drill"));
    assert_eq!(status.updated_at, Some(t0));
    assert_eq!(status.action_counts[&EmergencyAction::PauseTrading], 1);
}

#[test]
fn resume_preserves_counters_and_keeps_reason_unless_given() {
    let mut state = RiskControlState::new();
    let t0 = Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap();
    let t1 = Utc.with_ymd_and_hms(2026, 7, 1, 12, 5, 0).unwrap();

    state.activate(EmergencyAction::CancelAll, Some("spike".to_string()), t0);
    let status = state.resume(None, t1);

    assert!(!status.emergency_stop_active);
    assert_eq!(status.last_reason.as_deref(), Some("spike"));
    assert_eq!(status.updated_at, Some(t1));
    assert_eq!(status.action_counts[&EmergencyAction::CancelAll], 1);

    // Explicit reason overwrites.
    let t2 = Utc.with_ymd_and_hms(2026, 7, 1, 12, 6, 0).unwrap();
    state.activate(EmergencyAction::CancelAll, None, t2);
    let status = state.resume(Some("all clear".to_string()), t2);
    assert_eq!(status.last_reason.as_deref(), Some("all clear"));
    assert_eq!(status.action_counts[&EmergencyAction::CancelAll], 2);
}

#[test]
fn synthetic_violation_carries_last_action_evidence() {
    let mut state = RiskControlState::new();
    let t0 = Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap();
    state.activate(EmergencyAction::DisableLive, None, t0);

    let violation = state.emergency_stop_violation();
    assert_eq!(violation.code, ViolationCode::EmergencyStopActive);
    assert_eq!(
        violation.details["lastAction"],
        serde_json::json!("disableLive")
    );
    assert!(!violation.details["updatedAt"].is_null());
}
