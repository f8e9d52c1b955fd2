use serde::Serialize;

/// Structured trace events emitted across the deep-research crates, in
/// addition to the Session event log (which is the user/subscriber-facing
/// log). These are operator-facing only and go to `tracing`, never to a
/// client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
        query_chars: usize,
    },
    SessionTerminal {
        session_id: String,
        status: String,
        duration_ms: i64,
    },
    AgentSpawned {
        session_id: String,
        agent_id: String,
    },
    LlmRequest {
        provider: String,
        model: String,
        role: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    LlmRetry {
        role: String,
        attempt: u32,
        error_kind: String,
        backoff_ms: u64,
    },
    ToolDispatched {
        session_id: String,
        agent_id: String,
        tool_name: String,
        duration_ms: i64,
        ok: bool,
    },
    RateGateDispatch {
        queue_depth: usize,
        wait_ms: u64,
    },
    SubscriberOverflow {
        session_id: String,
        subscriber_id: u64,
    },
    WorkspaceCleanupScheduled {
        session_id: String,
        delay_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "dr_event");
    }
}
