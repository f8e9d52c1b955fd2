//! In-memory session store.
//!
//! Each session is an independent `SessionInner` (domain state plus its
//! subscriber list) guarded by one lock, so an event append and the fan-out
//! it triggers are atomic with respect to a concurrently-attaching
//! subscriber: a subscriber that registers mid-append either sees the event
//! in its backlog replay or receives it live, never both and never neither.
//!
//! Sessions never persist to disk — a restart loses in-flight research.
//! That tradeoff mirrors the teacher's in-memory-first design, generalized
//! here to run entirely without a backing file since there is no multi-hour
//! gateway process to restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dr_domain::cancel::CancelMap;
use dr_domain::model::{
    Agent, AgentErrorType, AgentStatus, ApiKeys, ErrorSource, Event, EventPayload, FlowEdge,
    FlowNode, ModelSelection, PlanStep, Session, SessionStatus, StepToolCallSummary, ToolCall,
    ToolCallStatus, ORCHESTRATOR_AGENT_ID,
};
use dr_domain::trace::TraceEvent;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Derives the `CancelMap` key for a session's orchestrator-level token.
/// Sub-agent tokens are registered under `"{session_id}/{agent_id}"` and
/// joined to this group so cancelling the session cascades to every agent.
pub fn cancel_key(session_id: &str) -> String {
    session_id.to_string()
}

pub fn agent_cancel_key(session_id: &str, agent_id: &str) -> String {
    format!("{session_id}/{agent_id}")
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Event>,
}

struct SessionInner {
    session: Session,
    subscribers: Vec<Subscriber>,
}

struct SessionHandle {
    inner: Mutex<SessionInner>,
    next_seq: AtomicU64,
    next_subscriber_id: AtomicU64,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    subscriber_channel_capacity: usize,
    pub cancel: CancelMap,
}

impl SessionStore {
    pub fn new(subscriber_channel_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            subscriber_channel_capacity: subscriber_channel_capacity.max(1),
            cancel: CancelMap::new(),
        }
    }

    pub fn create(
        &self,
        query: String,
        clarification: Option<String>,
        models: ModelSelection,
        api_keys: ApiKeys,
    ) -> Session {
        let now = Utc::now();
        let session_id = uuid::Uuid::new_v4().to_string();
        let session = Session::new(
            session_id.clone(),
            query.clone(),
            clarification,
            models,
            api_keys,
            now,
        );

        let handle = Arc::new(SessionHandle {
            inner: Mutex::new(SessionInner {
                session: session.clone(),
                subscribers: Vec::new(),
            }),
            next_seq: AtomicU64::new(0),
            next_subscriber_id: AtomicU64::new(0),
        });
        self.sessions
            .write()
            .insert(session_id.clone(), handle);
        self.cancel.register(cancel_key(&session_id));

        TraceEvent::SessionCreated {
            session_id: session_id.clone(),
            query_chars: query.chars().count(),
        }
        .emit();
        self.emit(
            &session_id,
            EventPayload::Connected {
                session_id: session_id.clone(),
            },
        );

        session
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.handle(session_id).map(|h| h.inner.lock().session.clone())
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    fn handle(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Attach a new subscriber, replaying every event appended so far before
    /// any subsequently-emitted event arrives on the channel.
    pub fn subscribe(&self, session_id: &str) -> Option<mpsc::Receiver<Event>> {
        let handle = self.handle(session_id)?;
        let (tx, rx) = mpsc::channel(self.subscriber_channel_capacity);
        let mut inner = handle.inner.lock();
        for event in &inner.session.events {
            // Backlog should fit comfortably within channel capacity for any
            // session still worth subscribing to; a dropped backlog entry
            // here would just mean a gap, not a panic.
            let _ = tx.try_send(event.clone());
        }
        let id = handle.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        inner.subscribers.push(Subscriber { id, tx });
        Some(rx)
    }

    fn emit(&self, session_id: &str, payload: EventPayload) -> Option<Event> {
        let handle = self.handle(session_id)?;
        let mut inner = handle.inner.lock();
        let seq = handle.next_seq.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            seq,
            timestamp: Utc::now(),
            payload,
        };
        inner.session.events.push(event.clone());
        inner.session.updated_at = event.timestamp;
        fan_out(&mut inner.subscribers, &event, session_id);
        Some(event)
    }

    pub fn update_session_status(&self, session_id: &str, status: SessionStatus) {
        let Some(handle) = self.handle(session_id) else { return };
        let was_terminal;
        let created_at;
        {
            let mut inner = handle.inner.lock();
            was_terminal = inner.session.status.is_terminal();
            inner.session.status = status;
            created_at = inner.session.created_at;
        }
        if !was_terminal {
            self.emit(session_id, EventPayload::SessionStatusChange { status });
        }
        if status.is_terminal() {
            TraceEvent::SessionTerminal {
                session_id: session_id.to_string(),
                status: format!("{status:?}").to_lowercase(),
                duration_ms: (Utc::now() - created_at).num_milliseconds(),
            }
            .emit();
        }
    }

    pub fn add_agent(&self, session_id: &str, task: String, description: Option<String>) -> Option<String> {
        let handle = self.handle(session_id)?;
        let now = Utc::now();
        let agent_id = {
            let mut inner = handle.inner.lock();
            let agent_id = inner.session.next_agent_id();
            inner.session.agents.insert(
                agent_id.clone(),
                Agent {
                    agent_id: agent_id.clone(),
                    task: task.clone(),
                    description: description.clone(),
                    status: AgentStatus::Pending,
                    tool_calls: Vec::new(),
                    created_at: now,
                    updated_at: now,
                    last_activity: now,
                    error: None,
                    retry_count: 0,
                },
            );
            inner.session.flow.nodes.push(FlowNode {
                id: agent_id.clone(),
                kind: "sub_agent".into(),
            });
            inner.session.flow.edges.push(FlowEdge {
                from: ORCHESTRATOR_AGENT_ID.into(),
                to: agent_id.clone(),
            });
            agent_id
        };

        self.cancel.register(agent_cancel_key(session_id, &agent_id));
        self.cancel
            .add_to_group(&cancel_key(session_id), &agent_cancel_key(session_id, &agent_id));

        TraceEvent::AgentSpawned {
            session_id: session_id.to_string(),
            agent_id: agent_id.clone(),
        }
        .emit();
        self.emit(
            session_id,
            EventPayload::AgentSpawned {
                agent_id: agent_id.clone(),
                task,
                description,
            },
        );
        Some(agent_id)
    }

    pub fn update_agent_status(
        &self,
        session_id: &str,
        agent_id: &str,
        status: AgentStatus,
        error: Option<String>,
    ) -> bool {
        let Some(handle) = self.handle(session_id) else { return false };
        let retry_count = {
            let mut inner = handle.inner.lock();
            let Some(agent) = inner.session.agents.get_mut(agent_id) else { return false };
            if !agent.status.can_transition_to(status) {
                return false;
            }
            agent.status = status;
            agent.error = error.clone();
            agent.updated_at = Utc::now();
            agent.last_activity = agent.updated_at;
            if status == AgentStatus::Retrying {
                agent.retry_count += 1;
            }
            agent.retry_count
        };
        self.emit(
            session_id,
            EventPayload::AgentStatusChange {
                agent_id: agent_id.to_string(),
                status,
                error,
                retry_count: Some(retry_count),
            },
        );
        true
    }

    pub fn fail_agent(
        &self,
        session_id: &str,
        agent_id: &str,
        error: String,
        error_type: AgentErrorType,
    ) {
        let Some(handle) = self.handle(session_id) else { return };
        let attempts = {
            let mut inner = handle.inner.lock();
            let Some(agent) = inner.session.agents.get_mut(agent_id) else { return };
            agent.status = AgentStatus::Failed;
            agent.error = Some(error.clone());
            agent.updated_at = Utc::now();
            agent.retry_count + 1
        };
        self.emit(
            session_id,
            EventPayload::AgentFailed {
                agent_id: agent_id.to_string(),
                error,
                error_type,
                attempts,
            },
        );
    }

    pub fn add_tool_call(
        &self,
        session_id: &str,
        agent_id: &str,
        tool_name: String,
        input: serde_json::Value,
        step_number: u32,
        index_in_step: u32,
        description: Option<String>,
    ) -> Option<String> {
        let handle = self.handle(session_id)?;
        let now = Utc::now();
        let tool_call_id = uuid::Uuid::new_v4().to_string();
        {
            let mut inner = handle.inner.lock();
            let agent = inner.session.agents.get_mut(agent_id)?;
            let previous_tool_call_id = agent.tool_calls.last().map(|tc| tc.tool_call_id.clone());
            agent.tool_calls.push(ToolCall {
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
                step_number,
                index_in_step,
                input: input.clone(),
                status: ToolCallStatus::Executing,
                result: None,
                created_at: now,
                started_at: Some(now),
                completed_at: None,
                duration_ms: None,
                description: description.clone(),
            });
            agent.last_activity = now;

            // Ties the call to its agent and, when the agent has made prior
            // calls, chains it after the last one so the flow graph reads as
            // a sequence rather than a star of disconnected calls.
            inner.session.flow.nodes.push(FlowNode {
                id: tool_call_id.clone(),
                kind: tool_name.clone(),
            });
            inner.session.flow.edges.push(FlowEdge {
                from: agent_id.to_string(),
                to: tool_call_id.clone(),
            });
            if let Some(previous_tool_call_id) = previous_tool_call_id {
                inner.session.flow.edges.push(FlowEdge {
                    from: previous_tool_call_id,
                    to: tool_call_id.clone(),
                });
            }
        }
        self.emit(
            session_id,
            EventPayload::ToolCall {
                agent_id: agent_id.to_string(),
                tool_call_id: tool_call_id.clone(),
                tool_name,
                input,
                step_number,
                index_in_step,
                started_at: now,
                description,
            },
        );
        Some(tool_call_id)
    }

    pub fn update_tool_call(
        &self,
        session_id: &str,
        agent_id: &str,
        tool_call_id: &str,
        status: ToolCallStatus,
        result: serde_json::Value,
    ) -> bool {
        let Some(handle) = self.handle(session_id) else { return false };
        let now = Utc::now();
        let emitted = {
            let mut inner = handle.inner.lock();
            let Some(agent) = inner.session.agents.get_mut(agent_id) else { return false };
            let Some(tc) = agent
                .tool_calls
                .iter_mut()
                .find(|tc| tc.tool_call_id == tool_call_id)
            else {
                return false;
            };
            tc.finish(status, result.clone(), now);
            agent.last_activity = now;
            EventPayload::ToolResult {
                agent_id: agent_id.to_string(),
                tool_call_id: tool_call_id.to_string(),
                tool_name: tc.tool_name.clone(),
                status,
                result: Some(result),
                started_at: tc.started_at.unwrap_or(now),
                completed_at: now,
                duration_ms: tc.duration_ms.unwrap_or(0),
                step_number: tc.step_number,
                index_in_step: tc.index_in_step,
            }
        };
        self.emit(session_id, emitted);
        true
    }

    pub fn add_orchestrator_step(
        &self,
        session_id: &str,
        step_number: u32,
        tool_calls: Vec<StepToolCallSummary>,
    ) {
        self.emit(
            session_id,
            EventPayload::OrchestratorStep {
                step_number,
                tool_calls,
            },
        );
    }

    /// Records the orchestrator's strategic framing of the query, set once
    /// after `generate_plan` runs. Does not itself emit an event; the caller
    /// folds this into the same `orchestrator_step` that ran the plan.
    pub fn set_strategic_perspective(&self, session_id: &str, perspective: String) {
        let Some(handle) = self.handle(session_id) else { return };
        let mut inner = handle.inner.lock();
        inner.session.strategic_perspective = Some(perspective);
    }

    pub fn update_plan(&self, session_id: &str, steps: Vec<PlanStep>) {
        let Some(handle) = self.handle(session_id) else { return };
        {
            let mut inner = handle.inner.lock();
            inner.session.plan = steps
                .iter()
                .map(|s| (s.step_id.clone(), s.clone()))
                .collect();
        }
        let total_steps = steps.len() as u32;
        self.emit(session_id, EventPayload::PlanUpdate { steps, total_steps });
    }

    pub fn emit_error(
        &self,
        session_id: &str,
        source: ErrorSource,
        error: String,
        stack: Option<String>,
        agent_id: Option<String>,
    ) {
        self.emit(
            session_id,
            EventPayload::Error {
                source,
                error,
                stack,
                agent_id,
            },
        );
    }

    pub fn flow_data(&self, session_id: &str) -> Option<dr_domain::model::FlowGraph> {
        self.handle(session_id)
            .map(|h| h.inner.lock().session.flow.clone())
    }

    /// Cancel a session and every sub-agent cascaded under its group,
    /// transitioning the session to `Failed` with a synthetic error event.
    pub fn cancel_session(&self, session_id: &str, reason: &str) {
        self.cancel.cancel(&cancel_key(session_id));
        self.emit_error(
            session_id,
            ErrorSource::System,
            format!("session cancelled: {reason}"),
            None,
            None,
        );
        self.update_session_status(session_id, SessionStatus::Failed);
    }

    /// Remove every session whose terminal status has outlived `retention`,
    /// releasing its cancellation tokens. Returns the removed session IDs so
    /// the caller can also reap their workspace directories.
    pub fn cleanup_old(&self, retention: Duration) -> Vec<String> {
        let now = Utc::now();
        let expired: Vec<String> = {
            let sessions = self.sessions.read();
            sessions
                .iter()
                .filter_map(|(id, handle)| {
                    let inner = handle.inner.lock();
                    let session = &inner.session;
                    let age = now - session.updated_at;
                    if session.status.is_terminal()
                        && age.to_std().unwrap_or_default() >= retention
                    {
                        Some(id.clone())
                    } else {
                        None
                    }
                })
                .collect()
        };
        let mut sessions = self.sessions.write();
        for id in &expired {
            sessions.remove(id);
            self.cancel.remove(&cancel_key(id));
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }
}

fn fan_out(subscribers: &mut Vec<Subscriber>, event: &Event, session_id: &str) {
    subscribers.retain_mut(|sub| match sub.tx.try_send(event.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            TraceEvent::SubscriberOverflow {
                session_id: session_id.to_string(),
                subscriber_id: sub.id,
            }
            .emit();
            let overflow = Event {
                seq: event.seq,
                timestamp: event.timestamp,
                payload: EventPayload::Error {
                    source: ErrorSource::System,
                    error: "subscriber overflowed event buffer; disconnecting".into(),
                    stack: None,
                    agent_id: None,
                },
            };
            let _ = sub.tx.try_send(overflow);
            false
        }
        Err(TrySendError::Closed(_)) => false,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_domain::model::ModelSelection;

    fn models() -> ModelSelection {
        ModelSelection {
            orchestrator: "anthropic/claude".into(),
            planner: "anthropic/claude".into(),
            summarizer: "anthropic/claude".into(),
            report_writer: "anthropic/claude".into(),
            sub_agent: "anthropic/claude".into(),
        }
    }

    fn keys() -> ApiKeys {
        ApiKeys {
            llm: "k".into(),
            search: "k".into(),
            sandbox: "k".into(),
        }
    }

    #[tokio::test]
    async fn create_emits_connected_event() {
        let store = SessionStore::new(32);
        let session = store.create("query".into(), None, models(), keys());
        let mut rx = store.subscribe(&session.session_id).unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event.payload, EventPayload::Connected { .. }));
    }

    #[tokio::test]
    async fn late_subscriber_replays_backlog() {
        let store = SessionStore::new(32);
        let session = store.create("query".into(), None, models(), keys());
        store.add_agent(&session.session_id, "task".into(), None);
        store.update_session_status(&session.session_id, SessionStatus::Planning);

        let mut rx1 = store.subscribe(&session.session_id).unwrap();
        let mut rx2 = store.subscribe(&session.session_id).unwrap();

        let mut events1 = Vec::new();
        let mut events2 = Vec::new();
        for _ in 0..3 {
            events1.push(rx1.recv().await.unwrap().seq);
            events2.push(rx2.recv().await.unwrap().seq);
        }
        assert_eq!(events1, events2);
    }

    #[tokio::test]
    async fn overflowed_subscriber_gets_final_error_then_disconnects() {
        let store = SessionStore::new(1);
        let session = store.create("query".into(), None, models(), keys());
        let mut rx = store.subscribe(&session.session_id).unwrap();
        // Drain the connected event so the channel is empty before flooding it.
        let _ = rx.recv().await.unwrap();

        for i in 0..5 {
            store.add_agent(&session.session_id, format!("task{i}"), None);
        }

        // The channel has capacity 1; at least one AgentSpawned event should
        // have overflowed it, producing a final synthetic error event.
        let mut saw_error = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event.payload, EventPayload::Error { .. }) {
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn agent_status_transition_rejects_backwards_move() {
        let store = SessionStore::new(32);
        let session = store.create("query".into(), None, models(), keys());
        let agent_id = store
            .add_agent(&session.session_id, "task".into(), None)
            .unwrap();
        assert!(store.update_agent_status(&session.session_id, &agent_id, AgentStatus::Running, None));
        assert!(store.update_agent_status(
            &session.session_id,
            &agent_id,
            AgentStatus::Completed,
            None
        ));
        assert!(!store.update_agent_status(
            &session.session_id,
            &agent_id,
            AgentStatus::Running,
            None
        ));
    }

    #[tokio::test]
    async fn tool_call_lifecycle_updates_duration() {
        let store = SessionStore::new(32);
        let session = store.create("query".into(), None, models(), keys());
        let agent_id = store
            .add_agent(&session.session_id, "task".into(), None)
            .unwrap();
        let tool_call_id = store
            .add_tool_call(
                &session.session_id,
                &agent_id,
                "web_search".into(),
                serde_json::json!({"query": "rust"}),
                1,
                0,
                None,
            )
            .unwrap();
        assert!(store.update_tool_call(
            &session.session_id,
            &agent_id,
            &tool_call_id,
            ToolCallStatus::Completed,
            serde_json::json!({"results": []}),
        ));
        let session = store.get(&session.session_id).unwrap();
        let tc = &session.agents[&agent_id].tool_calls[0];
        assert_eq!(tc.status, ToolCallStatus::Completed);
        assert!(tc.duration_ms.is_some());
    }

    #[tokio::test]
    async fn tool_calls_are_chained_in_the_flow_graph() {
        let store = SessionStore::new(32);
        let session = store.create("query".into(), None, models(), keys());
        let agent_id = store
            .add_agent(&session.session_id, "task".into(), None)
            .unwrap();
        let tc1 = store
            .add_tool_call(&session.session_id, &agent_id, "web_search".into(), serde_json::json!({}), 0, 0, None)
            .unwrap();
        let tc2 = store
            .add_tool_call(&session.session_id, &agent_id, "file".into(), serde_json::json!({}), 0, 1, None)
            .unwrap();

        let flow = store.flow_data(&session.session_id).unwrap();
        assert!(flow.nodes.iter().any(|n| n.id == tc1));
        assert!(flow.nodes.iter().any(|n| n.id == tc2));
        assert!(flow.edges.iter().any(|e| e.from == agent_id && e.to == tc1));
        assert!(flow.edges.iter().any(|e| e.from == agent_id && e.to == tc2));
        assert!(flow.edges.iter().any(|e| e.from == tc1 && e.to == tc2));
    }

    #[tokio::test]
    async fn cancel_session_cascades_to_agents() {
        let store = SessionStore::new(32);
        let session = store.create("query".into(), None, models(), keys());
        let agent_id = store
            .add_agent(&session.session_id, "task".into(), None)
            .unwrap();
        store.cancel_session(&session.session_id, "user requested stop");

        assert!(store
            .cancel
            .get(&cancel_key(&session.session_id))
            .unwrap()
            .is_cancelled());
        assert!(store
            .cancel
            .get(&agent_cancel_key(&session.session_id, &agent_id))
            .unwrap()
            .is_cancelled());
        let session = store.get(&session.session_id).unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn cleanup_old_removes_expired_terminal_sessions() {
        let store = SessionStore::new(32);
        let session = store.create("query".into(), None, models(), keys());
        store.update_session_status(&session.session_id, SessionStatus::Completed);
        let removed = store.cleanup_old(Duration::from_secs(0));
        assert_eq!(removed, vec![session.session_id.clone()]);
        assert!(store.get(&session.session_id).is_none());
    }

    #[tokio::test]
    async fn cleanup_old_keeps_active_sessions() {
        let store = SessionStore::new(32);
        let session = store.create("query".into(), None, models(), keys());
        let removed = store.cleanup_old(Duration::from_secs(0));
        assert!(removed.is_empty());
        assert!(store.get(&session.session_id).is_some());
    }
}
