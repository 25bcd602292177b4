//! aegis-backtest
//!
//! Candle-replay backtesting with a deliberately simple resolution model:
//! each signal scans forward and exits on the first touch of its stop loss
//! or take profit (stop checked first on every bar), falling back to the
//! last candle's close. This is an estimator for strategy iteration, not an
//! order-book simulation.

mod engine;
mod types;

pub use engine::run_backtest;
pub use types::{
    BacktestCandle, BacktestMetrics, BacktestResult, BacktestTrade, TradeOutcome, TradeSide,
    TradeSignal,
};
