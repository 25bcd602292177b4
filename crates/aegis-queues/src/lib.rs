//! aegis-queues
//!
//! Per-agent request admission. Each agent owns one queue with a single
//! active slot, an ordered pending list, and (in collect mode) a debounce
//! buffer that drains into one synthetic batch request.
//!
//! # Invariants
//!
//! - `|pending| + (active ? 1 : 0) <= cap` after every admission.
//! - A dedupe key appears in at most one of {active, pending, collect
//!   buffer}.
//! - The collect buffer is only ever populated in collect mode, and a
//!   buffered request never becomes active directly — only the synthetic
//!   `collected_*` batch does.
//! - `snapshot` / `from_snapshot` round-trip every field exactly.

mod agent_queue;
mod snapshot_store;

pub use agent_queue::{
    AgentQueue, AgentRequest, QueueDecision, QueueDecisionType, QueueDropPolicy, QueueMode,
    QueueSettings, QueueSnapshot, RequestPriority,
};
pub use snapshot_store::QueueSnapshotStore;
