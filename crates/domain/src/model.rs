//! The session execution engine's data model: Session, Agent, ToolCall,
//! PlanStep, and the typed Event log.
//!
//! Mirrors the shape of the teacher's run-tracking model (`RunStatus` /
//! `RunNode` / `RunEvent`) but keyed to the research domain instead of a
//! generic chat turn: a Session owns a mapping of agents (one pseudo-agent,
//! `"orchestrator"`, plus N sub-agents), a plan, and an append-only event
//! log fanned out to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const ORCHESTRATOR_AGENT_ID: &str = "orchestrator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Initializing,
    Planning,
    Executing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Pending,
    Running,
    Retrying,
    Completed,
    Failed,
}

impl AgentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Failed)
    }

    /// Enforces the invariant `pending < running < {completed, failed}`;
    /// `retrying` is a transient sibling of `running`.
    pub fn can_transition_to(self, next: AgentStatus) -> bool {
        use AgentStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Pending, Running) => true,
            (Running, Retrying) | (Retrying, Running) => true,
            (Running, Completed) | (Running, Failed) => true,
            (Retrying, Completed) | (Retrying, Failed) => true,
            (terminal, _) if terminal.is_terminal() => false,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Executing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStepStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelection {
    pub orchestrator: String,
    pub planner: String,
    pub summarizer: String,
    pub report_writer: String,
    pub sub_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiKeys {
    pub llm: String,
    pub search: String,
    pub sandbox: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_id: String,
    pub description: String,
    pub status: PlanStepStatus,
    #[serde(default)]
    pub agent_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    pub step_number: u32,
    pub index_in_step: u32,
    pub input: serde_json::Value,
    pub status: ToolCallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ToolCall {
    pub fn finish(&mut self, status: ToolCallStatus, result: serde_json::Value, now: DateTime<Utc>) {
        self.status = status;
        self.result = Some(result);
        self.completed_at = Some(now);
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: AgentStatus,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry_count: u32,
}

impl Agent {
    pub fn new_pseudo_orchestrator(now: DateTime<Utc>) -> Self {
        Self {
            agent_id: ORCHESTRATOR_AGENT_ID.into(),
            task: "coordinate research session".into(),
            description: None,
            status: AgentStatus::Running,
            tool_calls: Vec::new(),
            created_at: now,
            updated_at: now,
            last_activity: now,
            error: None,
            retry_count: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification: Option<String>,
    pub models: ModelSelection,
    #[serde(skip)]
    pub api_keys: ApiKeys,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub agents: HashMap<String, Agent>,
    pub plan: HashMap<String, PlanStep>,
    #[serde(skip)]
    pub events: Vec<Event>,
    pub flow: FlowGraph,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategic_perspective: Option<String>,
    pub next_agent_seq: u32,
}

impl Session {
    pub fn new(
        session_id: String,
        query: String,
        clarification: Option<String>,
        models: ModelSelection,
        api_keys: ApiKeys,
        now: DateTime<Utc>,
    ) -> Self {
        let mut agents = HashMap::new();
        agents.insert(
            ORCHESTRATOR_AGENT_ID.to_string(),
            Agent::new_pseudo_orchestrator(now),
        );
        let flow = FlowGraph {
            nodes: vec![FlowNode {
                id: ORCHESTRATOR_AGENT_ID.into(),
                kind: "orchestrator".into(),
            }],
            edges: Vec::new(),
        };
        Self {
            session_id,
            query,
            clarification,
            models,
            api_keys,
            status: SessionStatus::Initializing,
            created_at: now,
            updated_at: now,
            agents,
            plan: HashMap::new(),
            events: Vec::new(),
            flow,
            strategic_perspective: None,
            next_agent_seq: 1,
        }
    }

    pub fn next_agent_id(&mut self) -> String {
        let id = format!("agent_{}", self.next_agent_seq);
        self.next_agent_seq += 1;
        id
    }
}

/// Discriminated event union. `timestamp` is set once, at append time, and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    #[serde(rename = "connected")]
    Connected { session_id: String },
    #[serde(rename = "session_status_change")]
    SessionStatusChange { status: SessionStatus },
    #[serde(rename = "agent_spawned")]
    AgentSpawned {
        agent_id: String,
        task: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename = "agent_status_change")]
    AgentStatusChange {
        agent_id: String,
        status: AgentStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_count: Option<u32>,
    },
    #[serde(rename = "orchestrator_step")]
    OrchestratorStep {
        step_number: u32,
        tool_calls: Vec<StepToolCallSummary>,
    },
    #[serde(rename = "tool_call")]
    ToolCall {
        agent_id: String,
        tool_call_id: String,
        tool_name: String,
        input: serde_json::Value,
        step_number: u32,
        index_in_step: u32,
        started_at: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        agent_id: String,
        tool_call_id: String,
        tool_name: String,
        status: ToolCallStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        duration_ms: i64,
        step_number: u32,
        index_in_step: u32,
    },
    #[serde(rename = "plan_update")]
    PlanUpdate {
        steps: Vec<PlanStep>,
        total_steps: u32,
    },
    #[serde(rename = "error")]
    Error {
        source: ErrorSource,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
    },
    #[serde(rename = "agent_failed")]
    AgentFailed {
        agent_id: String,
        error: String,
        error_type: AgentErrorType,
        attempts: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepToolCallSummary {
    pub tool_name: String,
    pub input: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    Orchestrator,
    Agent,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentErrorType {
    BadRequest,
    RateLimit,
    ServerError,
    AuthError,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}
