use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aegis_risk::TradeIntent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "MODIFY")]
    Modify,
    #[serde(rename = "CLOSE")]
    Close,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSide {
    Buy,
    Sell,
}

impl SignalSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSide::Buy => "buy",
            SignalSide::Sell => "sell",
        }
    }
}

/// A published strategy signal, as broadcast to followers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CopyTradeSignal {
    pub signal_id: String,
    pub strategy_id: String,
    pub ts: DateTime<Utc>,
    pub symbol: String,
    pub timeframe: String,
    pub action: SignalAction,
    pub side: SignalSide,
    pub volume: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionFilter {
    #[serde(rename = "both")]
    Both,
    #[serde(rename = "long-only")]
    LongOnly,
    #[serde(rename = "short-only")]
    ShortOnly,
}

/// A follower's guard rails for mirrored signals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FollowerConstraints {
    pub allowed_symbols: Vec<String>,
    pub max_volume: f64,
    #[serde(default = "default_direction_filter")]
    pub direction_filter: DirectionFilter,
    #[serde(default = "default_max_signal_age_seconds")]
    pub max_signal_age_seconds: i64,
}

fn default_direction_filter() -> DirectionFilter {
    DirectionFilter::Both
}

fn default_max_signal_age_seconds() -> i64 {
    300
}

impl FollowerConstraints {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.max_volume > 0.0) {
            return Err("constraints.maxVolume must be > 0".to_string());
        }
        if self.max_signal_age_seconds < 1 {
            return Err("constraints.maxSignalAgeSeconds must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Why a signal was not mapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockReason {
    UnsupportedAction,
    SymbolNotAllowed,
    DirectionFilterBlock,
    SignalStale,
}

/// Outcome of mapping one signal for one follower account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyTradeMappingResult {
    pub intent: Option<TradeIntent>,
    pub blocked_reason: Option<BlockReason>,
    pub deduped: bool,
}

impl CopyTradeMappingResult {
    fn mapped(intent: TradeIntent) -> Self {
        Self {
            intent: Some(intent),
            blocked_reason: None,
            deduped: false,
        }
    }

    fn blocked(reason: BlockReason) -> Self {
        Self {
            intent: None,
            blocked_reason: Some(reason),
            deduped: false,
        }
    }

    fn deduped() -> Self {
        Self {
            intent: None,
            blocked_reason: None,
            deduped: true,
        }
    }
}

/// Maps publisher signals into follower trade intents.
///
/// Checks run in a fixed order: dedupe, action, symbol, direction, age.
/// Volume is clamped to the follower's ceiling; stops are copied verbatim.
/// The processed-signal set lives for the mapper's lifetime and is not
/// persisted.
#[derive(Clone, Debug)]
pub struct CopyTradeMapper {
    constraints: FollowerConstraints,
    processed_signal_ids: std::collections::HashSet<String>,
}

impl CopyTradeMapper {
    pub fn new(constraints: FollowerConstraints) -> Self {
        Self {
            constraints,
            processed_signal_ids: std::collections::HashSet::new(),
        }
    }

    pub fn constraints(&self) -> &FollowerConstraints {
        &self.constraints
    }

    /// Replace the follower's constraints; dedupe memory is kept.
    pub fn set_constraints(&mut self, constraints: FollowerConstraints) {
        self.constraints = constraints;
    }

    pub fn processed_count(&self) -> usize {
        self.processed_signal_ids.len()
    }

    pub fn map_signal(
        &mut self,
        signal: &CopyTradeSignal,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> CopyTradeMappingResult {
        if self.processed_signal_ids.contains(&signal.signal_id) {
            return CopyTradeMappingResult::deduped();
        }

        if signal.action != SignalAction::Open {
            return CopyTradeMappingResult::blocked(BlockReason::UnsupportedAction);
        }

        if !self
            .constraints
            .allowed_symbols
            .iter()
            .any(|s| s == &signal.symbol)
        {
            return CopyTradeMappingResult::blocked(BlockReason::SymbolNotAllowed);
        }

        let direction_blocked = match self.constraints.direction_filter {
            DirectionFilter::Both => false,
            DirectionFilter::LongOnly => signal.side != SignalSide::Buy,
            DirectionFilter::ShortOnly => signal.side != SignalSide::Sell,
        };
        if direction_blocked {
            return CopyTradeMappingResult::blocked(BlockReason::DirectionFilterBlock);
        }

        // Age check: a signal exactly at the limit is still fresh.
        let age_seconds = (now - signal.ts).num_seconds();
        if age_seconds > self.constraints.max_signal_age_seconds {
            return CopyTradeMappingResult::blocked(BlockReason::SignalStale);
        }

        let intent = TradeIntent {
            account_id: account_id.to_string(),
            symbol: signal.symbol.clone(),
            action: "PLACE_MARKET_ORDER".to_string(),
            side: signal.side.as_str().to_string(),
            volume: signal.volume.min(self.constraints.max_volume),
            stop_loss: Some(signal.stop_loss),
            take_profit: Some(signal.take_profit),
        };
        self.processed_signal_ids.insert(signal.signal_id.clone());
        CopyTradeMappingResult::mapped(intent)
    }
}
