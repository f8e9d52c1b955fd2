//! Orchestrator loop (§4.2): the top-level agent that frames a strategic
//! perspective on the query, plans the session, spawns and supervises
//! sub-agents, and assembles the final report. Structured like
//! `sub_agent.rs`'s tool loop — resolve provider, loop tool calls to
//! completion — with its own tool catalog and a session-wide cap on
//! outstanding agents instead of a per-tool call budget.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dr_domain::cancel::CancelToken;
use dr_domain::capability::ModelRole;
use dr_domain::message::{Message, MessageContent, Role, ToolDefinition};
use dr_domain::model::{
    AgentStatus, ApiKeys, ErrorSource, ModelSelection, PlanStep, PlanStepStatus, SessionStatus,
    StepToolCallSummary, ToolCallStatus, ORCHESTRATOR_AGENT_ID,
};
use dr_domain::tool_error::{ToolError, ToolErrorCode};
use dr_providers::ChatRequest;
use dr_sessions::store::agent_cancel_key;
use serde::Deserialize;
use serde_json::Value;

use crate::context::EngineContext;
use crate::report;
use crate::retry;
use crate::sub_agent::{self, SubAgentTask};
use crate::tools;

const MAX_LLM_ATTEMPTS: u32 = 3;
const WAIT_POLL_INTERVAL_MS: u64 = 2000;

pub struct OrchestratorJob {
    pub session_id: String,
    pub query: String,
    pub clarification: Option<String>,
    pub models: ModelSelection,
    pub api_keys: ApiKeys,
    pub cancel: CancelToken,
}

pub async fn run(ctx: Arc<EngineContext>, job: OrchestratorJob) {
    ctx.sessions
        .update_session_status(&job.session_id, SessionStatus::Planning);

    let session_dir = ctx.workspace.session_dir(&job.session_id);

    let Some((provider, model)) = ctx.providers.for_role(&job.models, ModelRole::Orchestrator)
    else {
        ctx.sessions.emit_error(
            &job.session_id,
            ErrorSource::Orchestrator,
            "no provider configured for the orchestrator role".to_string(),
            None,
            None,
        );
        ctx.sessions
            .update_session_status(&job.session_id, SessionStatus::Failed);
        return;
    };

    let mut messages = vec![
        Message::system(system_prompt()),
        Message::user(opening_message(&job)),
    ];
    let tool_defs = orchestrator_tool_defs();

    let mut any_tool_call = false;
    let mut report_written = false;
    let mut failure: Option<String> = None;

    for step in 0..ctx.config.orchestrator_step_cap {
        if job.cancel.is_cancelled() {
            return;
        }

        let request = ChatRequest {
            messages: messages.clone(),
            tools: tool_defs.clone(),
            temperature: Some(0.4),
            model: model.clone(),
            cancel: Some(job.cancel.clone()),
            ..Default::default()
        };

        let response = match call_with_retry(provider.as_ref(), request).await {
            Ok(r) => r,
            Err(error) => {
                failure = Some(error);
                break;
            }
        };
        messages.push(Message {
            role: Role::Assistant,
            content: MessageContent::Text(response.content.clone()),
        });

        if response.tool_calls.is_empty() {
            if !any_tool_call {
                failure = Some(
                    "orchestrator produced no tool calls before finishing its first turn"
                        .to_string(),
                );
            }
            break;
        }

        ctx.sessions
            .update_session_status(&job.session_id, SessionStatus::Executing);

        let mut summaries = Vec::with_capacity(response.tool_calls.len());
        for (index, call) in response.tool_calls.iter().enumerate() {
            if job.cancel.is_cancelled() {
                return;
            }
            any_tool_call = true;
            summaries.push(StepToolCallSummary {
                tool_name: call.tool_name.clone(),
                input: call.arguments.clone(),
            });

            let tool_call_id = ctx
                .sessions
                .add_tool_call(
                    &job.session_id,
                    ORCHESTRATOR_AGENT_ID,
                    call.tool_name.clone(),
                    call.arguments.clone(),
                    step,
                    index as u32,
                    None,
                )
                .unwrap_or_else(|| call.call_id.clone());

            let (result, ok, wrote_report) = dispatch_tool(
                &ctx,
                &job,
                &session_dir,
                &call.tool_name,
                call.arguments.clone(),
            )
            .await;
            report_written = report_written || wrote_report;

            ctx.sessions.update_tool_call(
                &job.session_id,
                ORCHESTRATOR_AGENT_ID,
                &tool_call_id,
                if ok { ToolCallStatus::Completed } else { ToolCallStatus::Failed },
                result.clone(),
            );

            messages.push(Message::tool_result(
                &call.call_id,
                &serde_json::to_string(&result).unwrap_or_default(),
            ));
        }
        ctx.sessions
            .add_orchestrator_step(&job.session_id, step, summaries);
    }

    if job.cancel.is_cancelled() {
        return;
    }

    if let Some(error) = failure {
        ctx.sessions.emit_error(
            &job.session_id,
            ErrorSource::Orchestrator,
            error,
            None,
            None,
        );
        ctx.sessions
            .update_session_status(&job.session_id, SessionStatus::Failed);
        return;
    }

    if !report_written {
        ctx.sessions.emit_error(
            &job.session_id,
            ErrorSource::Orchestrator,
            "orchestrator finished without producing a final report".to_string(),
            None,
            None,
        );
        ctx.sessions
            .update_session_status(&job.session_id, SessionStatus::Failed);
        return;
    }

    ctx.sessions
        .update_session_status(&job.session_id, SessionStatus::Completed);
    ctx.workspace.schedule_cleanup(
        &job.session_id,
        Duration::from_millis(ctx.config.session_cleanup_delay_ms),
    );
}

async fn call_with_retry(
    provider: &dyn dr_providers::LlmProvider,
    request: ChatRequest,
) -> Result<dr_providers::ChatResponse, String> {
    let mut attempt = 1;
    loop {
        match provider.chat(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(error) => {
                let error_type = retry::classify(&error);
                if attempt >= MAX_LLM_ATTEMPTS {
                    return Err(error.to_string());
                }
                tokio::time::sleep(retry::backoff(error_type, attempt)).await;
                attempt += 1;
            }
        }
    }
}

fn system_prompt() -> String {
    "You coordinate a deep research session. Work in this order: call generate_plan to break \
     the query into concrete research steps, call spawn_agent once per step to delegate \
     research to a sub-agent, call wait_for_agents to let them finish, call get_agent_result to \
     collect each sub-agent's findings, refine the plan with update_plan if the findings reveal \
     new steps, and finally call write_report exactly once to produce final_report.md. Stop \
     only after write_report has succeeded."
        .to_string()
}

fn opening_message(job: &OrchestratorJob) -> String {
    match &job.clarification {
        Some(clarification) => format!(
            "Research query: {}\n\nClarification from the user: {clarification}",
            job.query
        ),
        None => format!("Research query: {}", job.query),
    }
}

async fn dispatch_tool(
    ctx: &Arc<EngineContext>,
    job: &OrchestratorJob,
    session_dir: &Path,
    tool_name: &str,
    arguments: Value,
) -> (Value, bool, bool) {
    match tool_name {
        "generate_plan" => match serde_json::from_value(arguments) {
            Ok(input) => match generate_plan(ctx, job, session_dir, input).await {
                Ok(value) => (value, true, false),
                Err(e) => (tool_error_json(&e), false, false),
            },
            Err(e) => (invalid_input_json(&e), false, false),
        },
        "spawn_agent" => match serde_json::from_value(arguments) {
            Ok(input) => match spawn_agent(ctx, job, input).await {
                Ok(value) => (value, true, false),
                Err(e) => (tool_error_json(&e), false, false),
            },
            Err(e) => (invalid_input_json(&e), false, false),
        },
        "wait_for_agents" => match serde_json::from_value(arguments) {
            Ok(input) => (wait_for_agents(ctx, job, input).await, true, false),
            Err(e) => (invalid_input_json(&e), false, false),
        },
        "get_agent_result" => match serde_json::from_value(arguments) {
            Ok(input) => match get_agent_result(ctx, job, input).await {
                Ok(value) => (value, true, false),
                Err(e) => (tool_error_json(&e), false, false),
            },
            Err(e) => (invalid_input_json(&e), false, false),
        },
        "update_plan" => match serde_json::from_value(arguments) {
            Ok(input) => match update_plan(ctx, job, session_dir, input).await {
                Ok(value) => (value, true, false),
                Err(e) => (tool_error_json(&e), false, false),
            },
            Err(e) => (invalid_input_json(&e), false, false),
        },
        "write_report" => {
            let input: WriteReportInput = match serde_json::from_value(arguments) {
                Ok(input) => input,
                Err(e) => return (invalid_input_json(&e), false, false),
            };
            let Some(session) = ctx.sessions.get(&job.session_id) else {
                return (
                    tool_error_json(&ToolError::new(
                        ToolErrorCode::UnknownError,
                        "session disappeared".to_string(),
                        "retry".to_string(),
                        false,
                    )),
                    false,
                    false,
                );
            };
            let requested_agents: Vec<report::RequestedAgent> = input
                .agent_results
                .into_iter()
                .map(|a| report::RequestedAgent {
                    agent_id: a.agent_id,
                    task_override: a.task,
                })
                .collect();
            match report::write_report(
                ctx,
                &session,
                session_dir,
                &job.models,
                &job.api_keys,
                &requested_agents,
            )
            .await
            {
                Ok(confirmation) => (serde_json::json!({ "message": confirmation }), true, true),
                Err(e) => (tool_error_json(&e), false, false),
            }
        }
        "file" => match serde_json::from_value(arguments) {
            Ok(input) => match tools::file_tool::orchestrator_file(session_dir, input).await {
                Ok(value) => (value, true, false),
                Err(e) => (tool_error_json(&e), false, false),
            },
            Err(e) => (invalid_input_json(&e), false, false),
        },
        other => (
            serde_json::json!({ "error": format!("unknown tool '{other}'") }),
            false,
            false,
        ),
    }
}

#[derive(Debug, Deserialize)]
struct WriteReportInput {
    // Accepted for schema compatibility with the documented tool signature,
    // but unused: the orchestrator already holds the query/clarification on
    // `OrchestratorJob`, so the LLM-supplied copies are never read back.
    #[serde(default)]
    #[allow(dead_code)]
    query: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    clarification: Option<String>,
    #[serde(default)]
    agent_results: Vec<AgentResultInput>,
}

#[derive(Debug, Deserialize)]
struct AgentResultInput {
    agent_id: String,
    #[serde(default)]
    task: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratePlanInput {
    steps: Vec<PlanStepInput>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlanStepInput {
    description: String,
}

async fn generate_plan(
    ctx: &Arc<EngineContext>,
    job: &OrchestratorJob,
    session_dir: &Path,
    input: GeneratePlanInput,
) -> Result<Value, ToolError> {
    if input.steps.is_empty() {
        return Err(ToolError::new(
            ToolErrorCode::ValidationFailed,
            "a plan needs at least one step".to_string(),
            "supply one or more steps".to_string(),
            false,
        ));
    }

    let now = Utc::now();
    let steps: Vec<PlanStep> = input
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, s)| PlanStep {
            step_id: format!("step_{}", i + 1),
            description: s.description,
            status: PlanStepStatus::Pending,
            agent_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            order: Some(i as u32),
        })
        .collect();

    let perspective = strategic_perspective(ctx, job, &steps).await;

    ctx.sessions
        .set_strategic_perspective(&job.session_id, perspective.clone());
    ctx.sessions.update_plan(&job.session_id, steps.clone());

    let doc = dr_workspace::PlanDocument {
        session_id: job.session_id.clone(),
        created: now,
        updated: now,
        query: job.query.clone(),
        clarification_context: job.clarification.clone(),
        strategic_perspective: Some(perspective.clone()),
        reasoning: input.reasoning,
        steps: steps.clone(),
    };
    if let Err(e) = doc.write(session_dir).await {
        tracing::warn!(session_id = %job.session_id, error = %e, "failed to persist orchestrator_plan.json");
    }

    Ok(serde_json::json!({
        "strategicPerspective": perspective,
        "stepCount": steps.len(),
        "steps": steps.iter().map(|s| serde_json::json!({"stepId": s.step_id, "description": s.description})).collect::<Vec<_>>(),
    }))
}

async fn strategic_perspective(ctx: &Arc<EngineContext>, job: &OrchestratorJob, steps: &[PlanStep]) -> String {
    let Some((provider, model)) = ctx.providers.for_role(&job.models, ModelRole::Planner) else {
        return default_perspective(job, steps);
    };

    let plan_text = steps
        .iter()
        .map(|s| format!("- {}", s.description))
        .collect::<Vec<_>>()
        .join("\n");
    let request = ChatRequest {
        messages: vec![
            Message::system(
                "Given a research query and its planned steps, write a short strategic \
                 perspective (2-4 sentences) framing what a great answer looks like and what \
                 risks or gaps the plan should watch for. Respond with prose only.",
            ),
            Message::user(format!("Query: {}\n\nPlanned steps:\n{plan_text}", job.query)),
        ],
        model,
        temperature: Some(0.3),
        ..Default::default()
    };

    match provider.chat(request).await {
        Ok(resp) if !resp.content.trim().is_empty() => resp.content,
        _ => default_perspective(job, steps),
    }
}

fn default_perspective(job: &OrchestratorJob, steps: &[PlanStep]) -> String {
    format!(
        "Investigate \"{}\" across {} step(s), grounding every claim in cited sources.",
        job.query,
        steps.len()
    )
}

#[derive(Debug, Deserialize)]
struct SpawnAgentInput {
    task: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    context_files: Vec<String>,
}

async fn spawn_agent(
    ctx: &Arc<EngineContext>,
    job: &OrchestratorJob,
    input: SpawnAgentInput,
) -> Result<Value, ToolError> {
    let session = ctx.sessions.get(&job.session_id).ok_or_else(|| {
        ToolError::new(
            ToolErrorCode::UnknownError,
            "session disappeared".to_string(),
            "retry".to_string(),
            false,
        )
    })?;
    // `agents` always carries the pseudo-orchestrator entry; subtract it.
    let active = session
        .agents
        .values()
        .filter(|a| !a.status.is_terminal())
        .count()
        .saturating_sub(1);
    if active >= ctx.config.max_agents {
        return Err(ToolError::agent_limit_reached(ctx.config.max_agents));
    }

    let agent_id = ctx
        .sessions
        .add_agent(&job.session_id, input.task.clone(), input.description.clone())
        .ok_or_else(|| {
            ToolError::new(
                ToolErrorCode::UnknownError,
                "failed to register agent".to_string(),
                "retry".to_string(),
                true,
            )
        })?;

    let cancel = ctx
        .sessions
        .cancel
        .get(&agent_cancel_key(&job.session_id, &agent_id))
        .unwrap_or_else(CancelToken::new);

    ctx.sessions
        .update_agent_status(&job.session_id, &agent_id, AgentStatus::Running, None);

    let task = SubAgentTask {
        session_id: job.session_id.clone(),
        agent_id: agent_id.clone(),
        task: input.task,
        context_files: input.context_files,
        models: job.models.clone(),
        api_keys: job.api_keys.clone(),
        cancel,
    };

    let ctx_arc = Arc::clone(ctx);
    tokio::spawn(async move {
        sub_agent::run(ctx_arc, task).await;
    });

    Ok(serde_json::json!({ "agentId": agent_id, "status": "running" }))
}

#[derive(Debug, Deserialize)]
struct WaitForAgentsInput {
    agent_ids: Vec<String>,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

async fn wait_for_agents(ctx: &Arc<EngineContext>, job: &OrchestratorJob, input: WaitForAgentsInput) -> Value {
    let timeout = Duration::from_secs(
        input
            .timeout_seconds
            .unwrap_or(ctx.config.wait_for_agents_timeout_sec),
    );
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let Some(session) = ctx.sessions.get(&job.session_id) else {
            break;
        };
        let all_terminal = input.agent_ids.iter().all(|id| {
            session
                .agents
                .get(id)
                .map(|a| a.status.is_terminal())
                .unwrap_or(true)
        });
        if all_terminal || job.cancel.is_cancelled() || tokio::time::Instant::now() >= deadline {
            let timed_out = !all_terminal;
            let agents = input
                .agent_ids
                .iter()
                .map(|id| match session.agents.get(id) {
                    Some(a) => serde_json::json!({
                        "agentId": id,
                        "status": format!("{:?}", a.status).to_lowercase(),
                        "error": a.error,
                    }),
                    None => serde_json::json!({ "agentId": id, "status": "unknown", "error": "no such agent" }),
                })
                .collect::<Vec<_>>();
            return serde_json::json!({
                "allCompleted": all_terminal,
                "timedOut": timed_out,
                "agents": agents,
            });
        }
        tokio::time::sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
    }

    serde_json::json!({ "allCompleted": false, "timedOut": true, "agents": [] })
}

#[derive(Debug, Deserialize)]
struct GetAgentResultInput {
    agent_id: String,
}

async fn get_agent_result(
    ctx: &Arc<EngineContext>,
    job: &OrchestratorJob,
    input: GetAgentResultInput,
) -> Result<Value, ToolError> {
    let session = ctx.sessions.get(&job.session_id).ok_or_else(|| {
        ToolError::new(ToolErrorCode::UnknownError, "session disappeared".to_string(), "retry".to_string(), false)
    })?;
    let agent = session
        .agents
        .get(&input.agent_id)
        .ok_or_else(|| ToolError::new(ToolErrorCode::AgentNotFound, format!("no such agent: {}", input.agent_id), "check the agent id".to_string(), false))?;

    if !agent.status.is_terminal() {
        return Err(ToolError::agent_not_ready(&input.agent_id));
    }

    let agent_dir = ctx.workspace.agent_dir(&job.session_id, &input.agent_id);
    let results = dr_workspace::files::read(&agent_dir, "results.md", None, None)
        .await
        .ok()
        .and_then(|v| v["content"].as_str().map(str::to_string))
        .unwrap_or_default();
    let artifacts = ctx
        .workspace
        .collect_agent_artifacts(&job.session_id, &input.agent_id)
        .await
        .unwrap_or_default();

    Ok(serde_json::json!({
        "agentId": input.agent_id,
        "status": format!("{:?}", agent.status).to_lowercase(),
        "error": agent.error,
        "results": results,
        "artifacts": artifacts,
    }))
}

#[derive(Debug, Deserialize)]
struct UpdatePlanInput {
    steps: Vec<PlanStepInput>,
    #[serde(default = "default_mode")]
    mode: String,
}

fn default_mode() -> String {
    "replace".to_string()
}

async fn update_plan(
    ctx: &Arc<EngineContext>,
    job: &OrchestratorJob,
    session_dir: &Path,
    input: UpdatePlanInput,
) -> Result<Value, ToolError> {
    let session = ctx.sessions.get(&job.session_id).ok_or_else(|| {
        ToolError::new(ToolErrorCode::UnknownError, "session disappeared".to_string(), "retry".to_string(), false)
    })?;

    let now = Utc::now();
    let mut existing: Vec<PlanStep> = session.plan.into_values().collect();
    existing.sort_by_key(|s| s.order.unwrap_or(u32::MAX));
    let next_index = existing.len();

    let fresh: Vec<PlanStep> = input
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, s)| PlanStep {
            step_id: format!("step_{}", next_index + i + 1),
            description: s.description,
            status: PlanStepStatus::Pending,
            agent_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            order: Some((next_index + i) as u32),
        })
        .collect();

    let steps = match input.mode.as_str() {
        "append" => {
            existing.extend(fresh);
            existing
        }
        _ => fresh,
    };

    ctx.sessions.update_plan(&job.session_id, steps.clone());

    let doc = match dr_workspace::PlanDocument::read(session_dir).await {
        Ok(mut doc) => {
            doc.steps = steps.clone();
            doc.updated = now;
            doc
        }
        Err(_) => dr_workspace::PlanDocument {
            session_id: job.session_id.clone(),
            created: now,
            updated: now,
            query: job.query.clone(),
            clarification_context: job.clarification.clone(),
            strategic_perspective: session.strategic_perspective.clone(),
            reasoning: None,
            steps: steps.clone(),
        },
    };
    if let Err(e) = doc.write(session_dir).await {
        tracing::warn!(session_id = %job.session_id, error = %e, "failed to persist orchestrator_plan.json");
    }

    Ok(serde_json::json!({ "stepCount": steps.len() }))
}

fn tool_error_json(error: &ToolError) -> Value {
    serde_json::to_value(error).unwrap_or_else(|_| serde_json::json!({ "error": error.message }))
}

fn invalid_input_json(error: &serde_json::Error) -> Value {
    serde_json::json!({ "error": format!("invalid tool input: {error}") })
}

fn orchestrator_tool_defs() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "generate_plan".into(),
            description: "Break the query into concrete research steps and frame a strategic perspective.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "steps": {
                        "type": "array",
                        "items": {"type": "object", "properties": {"description": {"type": "string"}}, "required": ["description"]}
                    },
                    "reasoning": {"type": "string"}
                },
                "required": ["steps"]
            }),
        },
        ToolDefinition {
            name: "spawn_agent".into(),
            description: "Delegate a research task to a new sub-agent.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "task": {"type": "string"},
                    "description": {"type": "string"},
                    "context_files": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["task"]
            }),
        },
        ToolDefinition {
            name: "wait_for_agents".into(),
            description: "Block until the named agents reach a terminal status or a timeout elapses.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "agent_ids": {"type": "array", "items": {"type": "string"}},
                    "timeout_seconds": {"type": "integer"}
                },
                "required": ["agent_ids"]
            }),
        },
        ToolDefinition {
            name: "get_agent_result".into(),
            description: "Fetch a terminal agent's results.md content and collected artifacts.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {"agent_id": {"type": "string"}},
                "required": ["agent_id"]
            }),
        },
        ToolDefinition {
            name: "update_plan".into(),
            description: "Replace or append to the session's plan.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "steps": {
                        "type": "array",
                        "items": {"type": "object", "properties": {"description": {"type": "string"}}, "required": ["description"]}
                    },
                    "mode": {"type": "string", "enum": ["replace", "append"]}
                },
                "required": ["steps", "mode"]
            }),
        },
        ToolDefinition {
            name: "write_report".into(),
            description: "Synthesize the given agents' findings and charts into final_report.md. \
                Pass agent_results to scope which completed agents are included and under what \
                task label; omit it to include every completed agent. Call exactly once, after \
                agents finish.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "agent_results": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "agent_id": {"type": "string"},
                                "task": {"type": "string"}
                            },
                            "required": ["agent_id"]
                        }
                    }
                }
            }),
        },
        ToolDefinition {
            name: "file".into(),
            description: "Read, write, append to, or list any file under the session directory.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "operation": {"type": "string", "enum": ["read", "write", "append", "list"]},
                    "path": {"type": "string"},
                    "content": {"type": "string"}
                },
                "required": ["operation", "path"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_perspective_mentions_query_and_step_count() {
        let job = OrchestratorJob {
            session_id: "s1".into(),
            query: "electric vehicle battery recycling".into(),
            clarification: None,
            models: ModelSelection {
                orchestrator: "a/b".into(),
                planner: "a/b".into(),
                summarizer: "a/b".into(),
                report_writer: "a/b".into(),
                sub_agent: "a/b".into(),
            },
            api_keys: ApiKeys { llm: "k".into(), search: "k".into(), sandbox: "k".into() },
            cancel: CancelToken::new(),
        };
        let steps = vec![];
        let text = default_perspective(&job, &steps);
        assert!(text.contains("electric vehicle battery recycling"));
    }
}
