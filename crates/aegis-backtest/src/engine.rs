use crate::types::{
    BacktestCandle, BacktestMetrics, BacktestResult, BacktestTrade, TradeOutcome, TradeSide,
    TradeSignal,
};

/// Replay candles through a strategy callback and resolve each signal by
/// first touch.
///
/// For every candle the strategy sees the full history and may emit one
/// signal. Resolution scans the candles after the signal bar: a long exits
/// at its stop when `low <= stopLoss`, else at its target when
/// `high >= takeProfit` (shorts mirror both tests); the stop is always
/// checked before the target within a bar. If nothing triggers before
/// end-of-data, the trade exits at the final close.
pub fn run_backtest<F>(
    candles: &[BacktestCandle],
    mut strategy: F,
    starting_equity: f64,
) -> BacktestResult
where
    F: FnMut(usize, &[BacktestCandle]) -> Option<TradeSignal>,
{
    let mut equity = starting_equity;
    let mut equity_curve = vec![equity];
    let mut trades: Vec<BacktestTrade> = Vec::new();

    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;

    for (index, candle) in candles.iter().enumerate() {
        let Some(signal) = strategy(index, candles) else {
            continue;
        };

        // A signal on an empty run can't happen here (we're iterating), so
        // the last candle always exists as the fallback exit.
        let trade = simulate_trade(&signal, &candle.ts, &candles[index + 1..], &candles[candles.len() - 1]);

        equity += trade.pnl;
        equity_curve.push(equity);

        if trade.pnl > 0.0 {
            gross_profit += trade.pnl;
        } else if trade.pnl < 0.0 {
            gross_loss += trade.pnl;
        }
        trades.push(trade);
    }

    let max_drawdown_pct = compute_max_drawdown_pct(&equity_curve);
    let wins = trades
        .iter()
        .filter(|t| t.outcome == TradeOutcome::Win)
        .count();
    let win_rate_pct = if trades.is_empty() {
        0.0
    } else {
        wins as f64 / trades.len() as f64 * 100.0
    };
    let profit_factor = if gross_loss != 0.0 {
        gross_profit / gross_loss.abs()
    } else {
        gross_profit.max(0.0)
    };
    let total_return_pct = if starting_equity != 0.0 {
        (equity - starting_equity) / starting_equity * 100.0
    } else {
        0.0
    };

    let metrics = BacktestMetrics {
        total_return_pct: round4(total_return_pct),
        max_drawdown_pct: round4(max_drawdown_pct),
        win_rate_pct: round4(win_rate_pct),
        profit_factor: round4(profit_factor),
        trades: trades.len(),
    };

    BacktestResult {
        trades,
        metrics,
        equity_curve,
    }
}

fn simulate_trade(
    signal: &TradeSignal,
    entry_ts: &str,
    future_candles: &[BacktestCandle],
    fallback_candle: &BacktestCandle,
) -> BacktestTrade {
    let mut exit_price = fallback_candle.close;
    let mut exit_ts = fallback_candle.ts.clone();

    for candle in future_candles {
        match signal.side {
            TradeSide::Buy => {
                if candle.low <= signal.stop_loss {
                    exit_price = signal.stop_loss;
                    exit_ts = candle.ts.clone();
                    break;
                }
                if candle.high >= signal.take_profit {
                    exit_price = signal.take_profit;
                    exit_ts = candle.ts.clone();
                    break;
                }
            }
            TradeSide::Sell => {
                if candle.high >= signal.stop_loss {
                    exit_price = signal.stop_loss;
                    exit_ts = candle.ts.clone();
                    break;
                }
                if candle.low <= signal.take_profit {
                    exit_price = signal.take_profit;
                    exit_ts = candle.ts.clone();
                    break;
                }
            }
        }
    }

    let pnl = match signal.side {
        TradeSide::Buy => exit_price - signal.entry,
        TradeSide::Sell => signal.entry - exit_price,
    };
    let outcome = if pnl > 0.0 {
        TradeOutcome::Win
    } else if pnl < 0.0 {
        TradeOutcome::Loss
    } else {
        TradeOutcome::Flat
    };

    BacktestTrade {
        entry_ts: entry_ts.to_string(),
        exit_ts,
        side: signal.side,
        entry: signal.entry,
        exit: exit_price,
        stop_loss: signal.stop_loss,
        take_profit: signal.take_profit,
        pnl,
        outcome,
    }
}

/// Max drawdown in percent against the running equity peak.
fn compute_max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let mut peak = equity_curve.first().copied().unwrap_or(0.0);
    let mut max_drawdown = 0.0;
    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            let drawdown = (peak - equity) / peak * 100.0;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }
    }
    max_drawdown
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
