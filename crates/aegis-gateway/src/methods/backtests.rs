use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use aegis_backtest::{run_backtest, BacktestCandle, TradeSide, TradeSignal};

use crate::methods::{parse_params, Failure, MethodResult, Reply};

/// A pre-computed signal pinned to a candle index. Backtests are driven by
/// declarative signal lists over the wire; strategy code itself never
/// crosses the session boundary.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct IndexedSignal {
    index: usize,
    side: TradeSide,
    entry: f64,
    stop_loss: f64,
    take_profit: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RunParams {
    candles: Vec<BacktestCandle>,
    signals: Vec<IndexedSignal>,
    #[serde(default)]
    starting_equity: Option<f64>,
}

pub(crate) fn run(request_id: &str, params: &Map<String, Value>) -> MethodResult {
    let params: RunParams = parse_params(params)?;
    if params.candles.is_empty() {
        return Err(Failure::invalid_params("candles must be non-empty"));
    }
    let starting_equity = params.starting_equity.unwrap_or(1_000.0);
    if !(starting_equity > 0.0) {
        return Err(Failure::invalid_params("startingEquity must be > 0"));
    }

    let mut by_index: BTreeMap<usize, TradeSignal> = BTreeMap::new();
    for signal in &params.signals {
        if signal.index >= params.candles.len() {
            return Err(Failure::invalid_params(format!(
                "signal index {} is out of range",
                signal.index
            )));
        }
        by_index.insert(
            signal.index,
            TradeSignal {
                side: signal.side,
                entry: signal.entry,
                stop_loss: signal.stop_loss,
                take_profit: signal.take_profit,
            },
        );
    }

    let result = run_backtest(
        &params.candles,
        |index, _history| by_index.get(&index).cloned(),
        starting_equity,
    );

    let result_value =
        serde_json::to_value(&result).expect("backtest result serialization must not fail");
    let metrics_value = result_value["metrics"].clone();

    Ok(Reply::ok(result_value)
        .with_event(
            "event.backtests.report",
            json!({"requestId": request_id, "metrics": metrics_value.clone()}),
        )
        .with_audit(
            "backtests.run",
            json!({
                "candles": params.candles.len(),
                "signals": params.signals.len(),
                "metrics": metrics_value,
            }),
        ))
}
