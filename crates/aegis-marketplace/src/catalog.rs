use chrono::{DateTime, Utc};

use crate::{CopyTradeSignal, SignalAction, SignalSide};

/// The marketplace signal catalog.
///
/// Hard-coded sample pair for dashboard wiring; a production deployment
/// replaces this with a real strategy catalog behind the same method.
pub fn example_signals(now: DateTime<Utc>) -> Vec<CopyTradeSignal> {
    vec![
        CopyTradeSignal {
            signal_id: "sig_eth_breakout_1".to_string(),
            strategy_id: "strat_eth_breakout".to_string(),
            ts: now,
            symbol: "ETHUSDm".to_string(),
            timeframe: "5m".to_string(),
            action: SignalAction::Open,
            side: SignalSide::Buy,
            volume: 0.10,
            entry: 2510.0,
            stop_loss: 2460.0,
            take_profit: 2610.0,
        },
        CopyTradeSignal {
            signal_id: "sig_btc_fade_1".to_string(),
            strategy_id: "strat_btc_fade".to_string(),
            ts: now,
            symbol: "BTCUSDm".to_string(),
            timeframe: "1h".to_string(),
            action: SignalAction::Open,
            side: SignalSide::Sell,
            volume: 0.05,
            entry: 64_200.0,
            stop_loss: 64_900.0,
            take_profit: 62_800.0,
        },
    ]
}
