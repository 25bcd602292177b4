use serde_json::json;

use crate::{AccountRiskSnapshot, RiskDecision, RiskPolicy, RiskViolation, TradeIntent, ViolationCode};

/// Evaluate one intent against a policy and an account snapshot.
///
/// Pure deterministic logic. No IO, no time, no broker calls. Every check
/// runs independently and every violation is reported; `allowed` holds
/// exactly when no check fails.
pub fn evaluate(
    intent: &TradeIntent,
    policy: &RiskPolicy,
    snapshot: &AccountRiskSnapshot,
) -> RiskDecision {
    let mut violations: Vec<RiskViolation> = Vec::new();

    // 1) Symbol allowlist. An empty allowlist blocks everything.
    if !policy.allowed_symbols.iter().any(|s| s == &intent.symbol) {
        violations.push(
            RiskViolation::new(
                ViolationCode::SymbolNotAllowed,
                "Symbol is not in the allowlist.",
            )
            .with_detail("symbol", json!(intent.symbol)),
        );
    }

    // 2) Volume ceiling. volume == maxVolume is allowed.
    if intent.volume > policy.max_volume {
        violations.push(
            RiskViolation::new(
                ViolationCode::MaxVolumeExceeded,
                "Requested volume exceeds maxVolume policy.",
            )
            .with_detail("volume", json!(intent.volume))
            .with_detail("maxVolume", json!(policy.max_volume)),
        );
    }

    // 3) Concurrent position cap.
    if snapshot.open_positions >= policy.max_concurrent_positions {
        violations.push(
            RiskViolation::new(
                ViolationCode::MaxConcurrentPositions,
                "Max concurrent positions reached.",
            )
            .with_detail("openPositions", json!(snapshot.open_positions))
            .with_detail(
                "maxConcurrentPositions",
                json!(policy.max_concurrent_positions),
            ),
        );
    }

    // 4) Daily loss limit. Only losses count: positive pnl clamps to zero,
    //    and hitting the limit exactly blocks.
    if snapshot.daily_pnl.min(0.0).abs() >= policy.max_daily_loss {
        violations.push(
            RiskViolation::new(ViolationCode::MaxDailyLoss, "Daily loss limit reached.")
                .with_detail("dailyPnl", json!(snapshot.daily_pnl))
                .with_detail("maxDailyLoss", json!(policy.max_daily_loss)),
        );
    }

    // 5) Protective stop requirement.
    if policy.require_stop_loss && intent.stop_loss.is_none() {
        violations.push(RiskViolation::new(
            ViolationCode::StopLossRequired,
            "Stop loss is required by policy.",
        ));
    }

    RiskDecision::from_violations(violations)
}
