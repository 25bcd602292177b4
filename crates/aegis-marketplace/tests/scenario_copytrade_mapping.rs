//! Copy-trade mapping scenarios: check ordering, constraint filters,
//! volume clamping, and dedupe memory.

use aegis_marketplace::{
    BlockReason, CopyTradeMapper, CopyTradeSignal, DirectionFilter, FollowerConstraints,
    SignalAction, SignalSide,
};
use chrono::{Duration, TimeZone, Utc};

fn constraints() -> FollowerConstraints {
    FollowerConstraints {
        allowed_symbols: vec!["ETHUSDm".to_string()],
        max_volume: 0.2,
        direction_filter: DirectionFilter::Both,
        max_signal_age_seconds: 300,
    }
}

fn signal(id: &str) -> CopyTradeSignal {
    CopyTradeSignal {
        signal_id: id.to_string(),
        strategy_id: "strat_eth_breakout".to_string(),
        ts: Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap(),
        symbol: "ETHUSDm".to_string(),
        timeframe: "5m".to_string(),
        action: SignalAction::Open,
        side: SignalSide::Buy,
        volume: 0.5,
        entry: 2510.0,
        stop_loss: 2460.0,
        take_profit: 2610.0,
    }
}

#[test]
fn open_signal_maps_with_volume_clamped_and_stops_copied() {
    let mut mapper = CopyTradeMapper::new(constraints());
    let now = signal("sig_1").ts + Duration::seconds(5);

    let result = mapper.map_signal(&signal("sig_1"), "acct_follower_1", now);
    let intent = result.intent.expect("intent mapped");

    assert_eq!(intent.account_id, "acct_follower_1");
    assert_eq!(intent.symbol, "ETHUSDm");
    assert_eq!(intent.side, "buy");
    assert_eq!(intent.action, "PLACE_MARKET_ORDER");
    assert_eq!(intent.volume, 0.2, "volume clamps to the follower ceiling");
    assert_eq!(intent.stop_loss, Some(2460.0));
    assert_eq!(intent.take_profit, Some(2610.0));
    assert!(!result.deduped);
    assert!(result.blocked_reason.is_none());
    assert_eq!(mapper.processed_count(), 1);
}

#[test]
fn repeated_signal_id_is_deduped_permanently() {
    let mut mapper = CopyTradeMapper::new(constraints());
    let now = signal("sig_1").ts + Duration::seconds(5);

    mapper.map_signal(&signal("sig_1"), "acct_1", now);
    let second = mapper.map_signal(&signal("sig_1"), "acct_1", now);

    assert!(second.deduped);
    assert!(second.intent.is_none());
    assert!(second.blocked_reason.is_none());
    assert_eq!(mapper.processed_count(), 1);
}

#[test]
fn non_open_actions_are_blocked_and_not_recorded() {
    let mut mapper = CopyTradeMapper::new(constraints());
    let now = signal("sig_1").ts;

    let mut close = signal("sig_close");
    close.action = SignalAction::Close;
    let result = mapper.map_signal(&close, "acct_1", now);

    assert_eq!(result.blocked_reason, Some(BlockReason::UnsupportedAction));
    // A blocked signal stays unprocessed: a corrected retry can still map.
    assert_eq!(mapper.processed_count(), 0);
}

#[test]
fn disallowed_symbol_is_blocked() {
    let mut mapper = CopyTradeMapper::new(constraints());
    let mut foreign = signal("sig_btc");
    foreign.symbol = "BTCUSDm".to_string();

    let result = mapper.map_signal(&foreign, "acct_1", foreign.ts);
    assert_eq!(result.blocked_reason, Some(BlockReason::SymbolNotAllowed));
}

#[test]
fn long_only_blocks_sell_and_short_only_blocks_buy() {
    let mut long_only = CopyTradeMapper::new(FollowerConstraints {
        direction_filter: DirectionFilter::LongOnly,
        ..constraints()
    });
    let mut sell = signal("sig_sell");
    sell.side = SignalSide::Sell;
    let result = long_only.map_signal(&sell, "acct_1", sell.ts);
    assert!(result.intent.is_none());
    assert_eq!(result.blocked_reason, Some(BlockReason::DirectionFilterBlock));

    let mut short_only = CopyTradeMapper::new(FollowerConstraints {
        direction_filter: DirectionFilter::ShortOnly,
        ..constraints()
    });
    let buy = signal("sig_buy");
    let result = short_only.map_signal(&buy, "acct_1", buy.ts);
    assert_eq!(result.blocked_reason, Some(BlockReason::DirectionFilterBlock));
}

#[test]
fn signal_age_boundary_is_inclusive() {
    let mut mapper = CopyTradeMapper::new(constraints());
    let base = signal("sig_edge");

    // Exactly at the limit: still fresh.
    let at_limit = base.ts + Duration::seconds(300);
    assert!(mapper
        .map_signal(&base, "acct_1", at_limit)
        .intent
        .is_some());

    // One second past: stale.
    let past_limit = base.ts + Duration::seconds(301);
    let stale = signal("sig_late");
    let result = mapper.map_signal(&stale, "acct_1", past_limit);
    assert_eq!(result.blocked_reason, Some(BlockReason::SignalStale));
}

#[test]
fn signal_ts_equal_to_now_is_fresh() {
    let mut mapper = CopyTradeMapper::new(constraints());
    let base = signal("sig_now");
    assert!(mapper.map_signal(&base, "acct_1", base.ts).intent.is_some());
}
