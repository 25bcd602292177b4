//! aegis-feeds
//!
//! Market-data feed catalog and subscriptions, a deterministic synthetic
//! candle source (the seam where a real market-data fetch would plug in),
//! and the hook pipeline that turns feed events into agent wake requests
//! and trade intents.

mod pipeline;
mod service;

pub use pipeline::{
    FeedEvent, FeedHookPipeline, FeedPipelineOutput, HookRegistration, HookType,
};
pub use service::{timeframe_to_seconds, Candle, FeedDescriptor, FeedService, FeedSubscription};
