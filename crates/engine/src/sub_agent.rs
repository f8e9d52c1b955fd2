//! Sub-agent execution loop (§4.3): drives a single research task to
//! completion and produces `results.md`. Structured like the teacher's
//! turn loop — resolve provider, build messages, loop tool calls to
//! completion — but adapted to emit [`dr_sessions::SessionStore`] events
//! instead of a `TurnEvent` channel, and to validate the produced results
//! file with up to two corrective retries.

use std::path::Path;
use std::sync::Arc;

use dr_domain::cancel::CancelToken;
use dr_domain::capability::ModelRole;
use dr_domain::message::{Message, MessageContent, Role, ToolDefinition};
use dr_domain::model::{AgentErrorType, AgentStatus, ApiKeys, ModelSelection, ToolCallStatus};
use dr_providers::ChatRequest;
use serde_json::Value;

use crate::budget::ToolBudget;
use crate::context::EngineContext;
use crate::retry;
use crate::tools;

const STEP_CAP: u32 = 25;
const MAX_RESULT_ATTEMPTS: u32 = 3;
const MIN_RESULT_CHARS: usize = 100;
const RESULTS_PLACEHOLDER: &str = "# Results\n\n_(pending)_\n";
const MAX_LLM_ATTEMPTS: u32 = 3;

pub struct SubAgentTask {
    pub session_id: String,
    pub agent_id: String,
    pub task: String,
    pub context_files: Vec<String>,
    pub models: ModelSelection,
    pub api_keys: ApiKeys,
    pub cancel: CancelToken,
}

pub async fn run(ctx: Arc<EngineContext>, job: SubAgentTask) {
    let agent_dir = match ctx.workspace.create_agent(&job.session_id, &job.agent_id).await {
        Ok(dir) => dir,
        Err(e) => {
            ctx.sessions.fail_agent(
                &job.session_id,
                &job.agent_id,
                format!("failed to create agent workspace: {e}"),
                AgentErrorType::Unknown,
            );
            return;
        }
    };

    if let Err(e) = dr_workspace::files::write(&agent_dir, "worklog.md", "# Worklog\n\n").await {
        tracing::warn!(agent_id = %job.agent_id, error = %e, "failed to seed worklog.md");
    }
    if let Err(e) = dr_workspace::files::write(&agent_dir, "results.md", RESULTS_PLACEHOLDER).await {
        ctx.sessions.fail_agent(
            &job.session_id,
            &job.agent_id,
            format!("failed to seed results.md: {e}"),
            AgentErrorType::Unknown,
        );
        return;
    }

    let mut messages = vec![Message::system(system_prompt(&job.task))];
    for path in &job.context_files {
        if let Ok(value) = dr_workspace::files::read(&agent_dir, path, None, None).await {
            if let Some(content) = value["content"].as_str() {
                messages.push(Message::system(format!("Context file {path}:\n\n{content}")));
            }
        }
    }
    messages.push(Message::user(job.task.clone()));

    let Some((provider, model)) = ctx.providers.for_role(&job.models, ModelRole::SubAgent) else {
        ctx.sessions.fail_agent(
            &job.session_id,
            &job.agent_id,
            "no provider configured for the sub_agent role".to_string(),
            AgentErrorType::Unknown,
        );
        return;
    };

    let mut budget = ToolBudget::sub_agent_defaults();
    let tool_defs = sub_agent_tool_defs();

    for attempt in 1..=MAX_RESULT_ATTEMPTS {
        let outcome = run_tool_loop(
            &ctx,
            &job,
            &agent_dir,
            provider.as_ref(),
            model.clone(),
            &tool_defs,
            &mut messages,
            &mut budget,
        )
        .await;

        if job.cancel.is_cancelled() {
            ctx.sessions.fail_agent(
                &job.session_id,
                &job.agent_id,
                "cancelled".to_string(),
                AgentErrorType::Unknown,
            );
            return;
        }

        if let Err((error, error_type)) = outcome {
            ctx.sessions.fail_agent(&job.session_id, &job.agent_id, error, error_type);
            return;
        }

        let results = dr_workspace::files::read(&agent_dir, "results.md", None, None)
            .await
            .ok()
            .and_then(|v| v["content"].as_str().map(str::to_string))
            .unwrap_or_default();

        if is_valid_results(&results) {
            ctx.sessions
                .update_agent_status(&job.session_id, &job.agent_id, AgentStatus::Completed, None);
            return;
        }

        if attempt == MAX_RESULT_ATTEMPTS {
            ctx.sessions.fail_agent(
                &job.session_id,
                &job.agent_id,
                "results.md did not contain a substantive write-up after 3 attempts".to_string(),
                AgentErrorType::Unknown,
            );
            return;
        }

        ctx.sessions
            .update_agent_status(&job.session_id, &job.agent_id, AgentStatus::Retrying, None);
        messages.push(Message::system(format!(
            "VALIDATION FAILED: results.md has fewer than {MIN_RESULT_CHARS} characters of \
             substantive content beyond its header. Write your findings to results.md \
             before finishing (attempt {} of {MAX_RESULT_ATTEMPTS})."
        , attempt + 1)));
    }
}

fn is_valid_results(content: &str) -> bool {
    let body = content
        .lines()
        .skip_while(|line| line.starts_with('#') || line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    body.trim().len() >= MIN_RESULT_CHARS
}

/// Runs the model to completion for one results attempt: alternates LLM
/// calls (with retry/backoff on transient failure) and tool dispatch until
/// the model stops requesting tools or `STEP_CAP` is hit.
async fn run_tool_loop(
    ctx: &EngineContext,
    job: &SubAgentTask,
    agent_dir: &Path,
    provider: &dyn dr_providers::LlmProvider,
    model: Option<String>,
    tool_defs: &[ToolDefinition],
    messages: &mut Vec<Message>,
    budget: &mut ToolBudget,
) -> Result<(), (String, AgentErrorType)> {
    for _step in 0..STEP_CAP {
        if job.cancel.is_cancelled() {
            return Ok(());
        }

        let request = ChatRequest {
            messages: messages.clone(),
            tools: tool_defs.to_vec(),
            temperature: Some(0.3),
            model: model.clone(),
            cancel: Some(job.cancel.clone()),
            ..Default::default()
        };

        let response = call_with_retry(provider, request).await?;

        messages.push(assistant_message(&response));

        if response.tool_calls.is_empty() {
            return Ok(());
        }

        for (index, call) in response.tool_calls.iter().enumerate() {
            if job.cancel.is_cancelled() {
                return Ok(());
            }

            let tool_name = tool_family(&call.tool_name);
            if !budget.allows(tool_name) {
                let limit = budget.limit_for(tool_name).unwrap_or(0);
                let error = dr_domain::tool_error::ToolError::tool_call_limit_reached(tool_name, limit);
                messages.push(Message::tool_result(&call.call_id, &error.message));
                continue;
            }

            let started = chrono::Utc::now();
            let tool_call_id = ctx
                .sessions
                .add_tool_call(
                    &job.session_id,
                    &job.agent_id,
                    call.tool_name.clone(),
                    call.arguments.clone(),
                    0,
                    index as u32,
                    None,
                )
                .unwrap_or_else(|| call.call_id.clone());

            let (result, ok, followup) = dispatch_tool(
                ctx,
                agent_dir,
                &job.models,
                &job.api_keys,
                &call.tool_name,
                call.arguments.clone(),
            )
            .await;
            if ok {
                budget.record_success(tool_name);
            } else {
                budget.record_failure(tool_name);
            }

            ctx.sessions.update_tool_call(
                &job.session_id,
                &job.agent_id,
                &tool_call_id,
                if ok { ToolCallStatus::Completed } else { ToolCallStatus::Failed },
                result.clone(),
            );

            let text_result = serde_json::to_string(&result).unwrap_or_default();
            messages.push(Message::tool_result(&call.call_id, &text_result));
            let _ = started;
            if let Some(followup) = followup {
                messages.push(followup);
            }
        }
    }
    Ok(())
}

async fn call_with_retry(
    provider: &dyn dr_providers::LlmProvider,
    request: ChatRequest,
) -> Result<dr_providers::ChatResponse, (String, AgentErrorType)> {
    let mut attempt = 1;
    loop {
        match provider.chat(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(error) => {
                let error_type = retry::classify(&error);
                if attempt >= MAX_LLM_ATTEMPTS {
                    return Err((error.to_string(), error_type));
                }
                tokio::time::sleep(retry::backoff(error_type, attempt)).await;
                attempt += 1;
            }
        }
    }
}

fn assistant_message(response: &dr_providers::ChatResponse) -> Message {
    Message {
        role: Role::Assistant,
        content: MessageContent::Text(response.content.clone()),
    }
}

/// Collapses `web_search`/`file`/`code_interpreter`/`view_image` tool-call
/// names to their budget bucket; all four are already exact tool names.
fn tool_family(tool_name: &str) -> &'static str {
    match tool_name {
        "web_search" => "web_search",
        "file" => "file",
        "code_interpreter" => "code_interpreter",
        "view_image" => "view_image",
        _ => "unknown",
    }
}

async fn dispatch_tool(
    ctx: &EngineContext,
    agent_dir: &Path,
    models: &ModelSelection,
    api_keys: &ApiKeys,
    tool_name: &str,
    arguments: Value,
) -> (Value, bool, Option<Message>) {
    match tool_name {
        "web_search" => match serde_json::from_value(arguments) {
            Ok(input) => match tools::search::web_search(ctx, models, api_keys, input).await {
                Ok(value) => (value, true, None),
                Err(e) => (tool_error_json(&e), false, None),
            },
            Err(e) => (invalid_input_json(&e), false, None),
        },
        "file" => match serde_json::from_value(arguments) {
            Ok(input) => match tools::file_tool::sub_agent_file(agent_dir, input).await {
                Ok(value) => (value, true, None),
                Err(e) => (tool_error_json(&e), false, None),
            },
            Err(e) => (invalid_input_json(&e), false, None),
        },
        "code_interpreter" => match serde_json::from_value(arguments) {
            Ok(input) => match tools::sandbox::code_interpreter(ctx, agent_dir, input).await {
                Ok(value) => (value, true, None),
                Err(e) => (tool_error_json(&e), false, None),
            },
            Err(e) => (invalid_input_json(&e), false, None),
        },
        "view_image" => match serde_json::from_value(arguments) {
            Ok(input) => match tools::view_image::view_image(agent_dir, input).await {
                Ok(outcome) => (outcome.tool_result, true, Some(outcome.followup_message)),
                Err(e) => (tool_error_json(&e), false, None),
            },
            Err(e) => (invalid_input_json(&e), false, None),
        },
        other => (
            serde_json::json!({ "error": format!("unknown tool '{other}'") }),
            false,
            None,
        ),
    }
}

fn tool_error_json(error: &dr_domain::tool_error::ToolError) -> Value {
    serde_json::to_value(error).unwrap_or_else(|_| serde_json::json!({ "error": error.message }))
}

fn invalid_input_json(error: &serde_json::Error) -> Value {
    serde_json::json!({ "error": format!("invalid tool input: {error}") })
}

fn system_prompt(task: &str) -> String {
    format!(
        "You are a research sub-agent. Your task: {task}\n\n\
         Use the available tools (web_search, file, code_interpreter, view_image) to \
         investigate thoroughly, then write your complete findings to results.md using \
         the `file` tool before finishing. Keep a running log in worklog.md. Do not stop \
         until results.md contains a full write-up of your findings."
    )
}

fn sub_agent_tool_defs() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "web_search".into(),
            description: "Search the web and return summarized results.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "num_results": {"type": "integer"},
                    "search_type": {"type": "string", "enum": ["neural", "keyword"]},
                    "use_autoprompt": {"type": "boolean"},
                    "start_published_date": {"type": "string"},
                    "description": {"type": "string"}
                },
                "required": ["query", "description"]
            }),
        },
        ToolDefinition {
            name: "file".into(),
            description: "Read, write, append to, or list worklog.md/results.md.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "operation": {"type": "string", "enum": ["read", "write", "append", "list"]},
                    "path": {"type": "string", "enum": ["worklog.md", "results.md"]},
                    "content": {"type": "string"},
                    "description": {"type": "string"}
                },
                "required": ["operation", "path", "description"]
            }),
        },
        ToolDefinition {
            name: "code_interpreter".into(),
            description: "Execute Python source in a sandbox and capture any rendered charts.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string"},
                    "purpose": {"type": "string"},
                    "outputFile": {"type": "string"},
                    "description": {"type": "string"}
                },
                "required": ["code", "description"]
            }),
        },
        ToolDefinition {
            name: "view_image".into(),
            description: "View an image produced by code_interpreter relative to the agent directory.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "imagePath": {"type": "string"},
                    "question": {"type": "string"},
                    "description": {"type": "string"}
                },
                "required": ["imagePath", "description"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_results_are_invalid() {
        assert!(!is_valid_results(RESULTS_PLACEHOLDER));
    }

    #[test]
    fn substantive_results_are_valid() {
        let content = format!("# Results\n\n{}", "x".repeat(150));
        assert!(is_valid_results(&content));
    }

    #[test]
    fn short_body_is_invalid() {
        assert!(!is_valid_results("# Results\n\nshort"));
    }
}
