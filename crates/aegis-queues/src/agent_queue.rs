use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Admission mode for an agent queue.
///
/// `steer-backlog` and `queue` are accepted and persisted as distinct values
/// but currently take the followup admission path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueMode {
    Followup,
    Interrupt,
    Collect,
    SteerBacklog,
    Queue,
}

/// What to do when the queue is full: evict the oldest pending request, or
/// reject the new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueDropPolicy {
    Old,
    New,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestPriority {
    High,
    Normal,
    Low,
}

impl Default for RequestPriority {
    fn default() -> Self {
        RequestPriority::Normal
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueueSettings {
    pub mode: QueueMode,
    #[serde(default = "default_cap")]
    pub cap: u32,
    #[serde(default = "default_drop_policy")]
    pub drop_policy: QueueDropPolicy,
    #[serde(default)]
    pub debounce_ms: u64,
}

fn default_cap() -> u32 {
    50
}

fn default_drop_policy() -> QueueDropPolicy {
    QueueDropPolicy::Old
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            mode: QueueMode::Followup,
            cap: default_cap(),
            drop_policy: default_drop_policy(),
            debounce_ms: 0,
        }
    }
}

impl QueueSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.cap < 1 {
            return Err("settings.cap must be >= 1".to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Requests and decisions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AgentRequest {
    pub request_id: String,
    pub agent_id: String,
    pub kind: String,
    #[serde(default)]
    pub priority: RequestPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl AgentRequest {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("requestId", &self.request_id),
            ("agentId", &self.agent_id),
            ("kind", &self.kind),
        ] {
            if value.trim().is_empty() {
                return Err(format!("request.{name} must be non-empty"));
            }
        }
        Ok(())
    }
}

/// The outcome of one admission attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueDecisionType {
    RunNow,
    Enqueued,
    Interrupt,
    Collecting,
    Deduped,
    Dropped,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueDecision {
    #[serde(rename = "type")]
    pub decision_type: QueueDecisionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AgentRequest>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl QueueDecision {
    fn of(decision_type: QueueDecisionType, request: AgentRequest) -> Self {
        Self {
            decision_type,
            request: Some(request),
            details: Map::new(),
        }
    }

    fn dropped(request: AgentRequest) -> Self {
        let mut details = Map::new();
        details.insert("reason".to_string(), json!("queue capacity reached"));
        Self {
            decision_type: QueueDecisionType::Dropped,
            request: Some(request),
            details,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The JSON shape persisted per agent by the snapshot store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueueSnapshot {
    pub settings: QueueSettings,
    pub active_request: Option<AgentRequest>,
    pub pending: Vec<AgentRequest>,
    pub collect_buffer: Vec<AgentRequest>,
    pub collect_last_enqueue_ms: Option<i64>,
}

// ---------------------------------------------------------------------------
// AgentQueue
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct AgentQueue {
    settings: QueueSettings,
    active_request: Option<AgentRequest>,
    pending: VecDeque<AgentRequest>,
    collect_buffer: Vec<AgentRequest>,
    collect_last_enqueue_ms: Option<i64>,
}

impl AgentQueue {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            settings,
            active_request: None,
            pending: VecDeque::new(),
            collect_buffer: Vec::new(),
            collect_last_enqueue_ms: None,
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn active_request(&self) -> Option<&AgentRequest> {
        self.active_request.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn collect_len(&self) -> usize {
        self.collect_buffer.len()
    }

    /// Admit one request at time `now_ms`.
    ///
    /// Admission order: dedupe, collect buffering, idle promotion,
    /// high-priority interrupt, capacity policy, append to pending.
    pub fn enqueue(&mut self, request: AgentRequest, now_ms: i64) -> QueueDecision {
        if self.is_duplicate(&request) {
            return QueueDecision::of(QueueDecisionType::Deduped, request);
        }

        if self.settings.mode == QueueMode::Collect {
            self.collect_buffer.push(request.clone());
            self.collect_last_enqueue_ms = Some(now_ms);
            return QueueDecision::of(QueueDecisionType::Collecting, request);
        }

        if self.active_request.is_none() {
            self.active_request = Some(request.clone());
            return QueueDecision::of(QueueDecisionType::RunNow, request);
        }

        if self.settings.mode == QueueMode::Interrupt
            && request.priority == RequestPriority::High
        {
            // The pre-empted active request is dropped, not re-queued.
            self.active_request = Some(request.clone());
            return QueueDecision::of(QueueDecisionType::Interrupt, request);
        }

        if !self.has_capacity_for_pending() {
            if self.settings.drop_policy == QueueDropPolicy::New {
                return QueueDecision::dropped(request);
            }
            if self.pending.pop_front().is_none() {
                // cap == 1 with an active request: nothing to evict.
                return QueueDecision::dropped(request);
            }
        }

        self.pending.push_back(request.clone());
        QueueDecision::of(QueueDecisionType::Enqueued, request)
    }

    /// Drain the collect buffer into one synthetic batch once the debounce
    /// window has elapsed. Returns `None` while the window is still open,
    /// outside collect mode, or when nothing is buffered.
    pub fn flush_collect(&mut self, now_ms: i64) -> Option<AgentRequest> {
        if self.settings.mode != QueueMode::Collect || self.collect_buffer.is_empty() {
            return None;
        }

        if let Some(last) = self.collect_last_enqueue_ms {
            if now_ms - last < self.settings.debounce_ms as i64 {
                return None;
            }
        }

        let collected = std::mem::take(&mut self.collect_buffer);
        self.collect_last_enqueue_ms = None;

        let request_ids: Vec<Value> = collected
            .iter()
            .map(|r| Value::String(r.request_id.clone()))
            .collect();
        let mut payload = Map::new();
        payload.insert("requestIds".to_string(), Value::Array(request_ids));
        payload.insert("count".to_string(), json!(collected.len()));

        Some(AgentRequest {
            request_id: format!("collected_{now_ms}"),
            agent_id: collected[0].agent_id.clone(),
            kind: "collect_batch".to_string(),
            priority: RequestPriority::Normal,
            dedupe_key: None,
            payload,
        })
    }

    /// Admit a request into the run lane directly, bypassing mode handling.
    ///
    /// Used for synthesized collect batches, which must not re-enter the
    /// collect buffer: the batch becomes active when the lane is idle and
    /// otherwise joins pending under the normal capacity policy.
    pub fn admit_direct(&mut self, request: AgentRequest) -> QueueDecision {
        if self.active_request.is_none() {
            self.active_request = Some(request.clone());
            return QueueDecision::of(QueueDecisionType::RunNow, request);
        }

        if !self.has_capacity_for_pending() {
            if self.settings.drop_policy == QueueDropPolicy::New {
                return QueueDecision::dropped(request);
            }
            if self.pending.pop_front().is_none() {
                return QueueDecision::dropped(request);
            }
        }

        self.pending.push_back(request.clone());
        QueueDecision::of(QueueDecisionType::Enqueued, request)
    }

    /// Clear the active slot; the head of pending (if any) becomes active
    /// and is returned.
    pub fn mark_active_complete(&mut self) -> Option<AgentRequest> {
        self.active_request = None;
        let next = self.pending.pop_front()?;
        self.active_request = Some(next.clone());
        Some(next)
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            settings: self.settings.clone(),
            active_request: self.active_request.clone(),
            pending: self.pending.iter().cloned().collect(),
            collect_buffer: self.collect_buffer.clone(),
            collect_last_enqueue_ms: self.collect_last_enqueue_ms,
        }
    }

    pub fn from_snapshot(snapshot: QueueSnapshot) -> Result<Self, String> {
        snapshot.settings.validate()?;
        if let Some(ref active) = snapshot.active_request {
            active.validate()?;
        }
        for request in snapshot.pending.iter().chain(snapshot.collect_buffer.iter()) {
            request.validate()?;
        }

        Ok(Self {
            settings: snapshot.settings,
            active_request: snapshot.active_request,
            pending: snapshot.pending.into(),
            collect_buffer: snapshot.collect_buffer,
            collect_last_enqueue_ms: snapshot.collect_last_enqueue_ms,
        })
    }

    fn has_capacity_for_pending(&self) -> bool {
        let occupied = self.pending.len() + usize::from(self.active_request.is_some());
        occupied < self.settings.cap as usize
    }

    fn is_duplicate(&self, request: &AgentRequest) -> bool {
        let Some(ref key) = request.dedupe_key else {
            return false;
        };

        let matches = |r: &AgentRequest| r.dedupe_key.as_ref() == Some(key);
        self.active_request.as_ref().map(matches).unwrap_or(false)
            || self.pending.iter().any(matches)
            || self.collect_buffer.iter().any(matches)
    }
}
