//! aegis-marketplace
//!
//! Published-strategy signals and the copy-trade mapper that turns a
//! publisher's signal into a follower's trade intent under that follower's
//! constraints.

mod catalog;
mod copytrade;

pub use catalog::example_signals;
pub use copytrade::{
    BlockReason, CopyTradeMapper, CopyTradeMappingResult, CopyTradeSignal, DirectionFilter,
    FollowerConstraints, SignalAction, SignalSide,
};
