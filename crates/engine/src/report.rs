//! `write_report` tool (§4.4.3, report-writer role): gathers every
//! completed sub-agent's results and chart artifacts, hands them to the
//! report-writer role as a multimodal request, and persists the response
//! verbatim as `final_report.md`.

use std::path::Path;

use base64::Engine;
use dr_domain::capability::ModelRole;
use dr_domain::message::{ContentPart, Message, MessageContent, Role};
use dr_domain::model::{AgentStatus, ApiKeys, ModelSelection, Session, ORCHESTRATOR_AGENT_ID};
use dr_domain::tool_error::{ToolError, ToolErrorCode};
use dr_providers::ChatRequest;

use crate::context::EngineContext;

const MAX_CHARTS: usize = 12;

/// An agent the orchestrator explicitly asked to have included in the
/// report, with an optional label to use in place of the agent's own
/// task/description.
pub struct RequestedAgent {
    pub agent_id: String,
    pub task_override: Option<String>,
}

pub async fn write_report(
    ctx: &EngineContext,
    session: &Session,
    session_dir: &Path,
    models: &ModelSelection,
    _api_keys: &ApiKeys,
    requested_agents: &[RequestedAgent],
) -> Result<String, ToolError> {
    let Some((provider, model)) = ctx.providers.for_role(models, ModelRole::ReportWriter) else {
        return Err(ToolError::new(
            ToolErrorCode::ApiError,
            "no provider configured for the report_writer role".to_string(),
            "configure a report_writer model in the session's model selection".to_string(),
            false,
        ));
    };

    // When the orchestrator scopes the report to specific agents, honor that
    // order and those task labels; otherwise fall back to every completed
    // agent, sorted for determinism.
    let agent_plan: Vec<(&str, Option<&str>)> = if requested_agents.is_empty() {
        let mut agent_ids: Vec<&String> = session
            .agents
            .keys()
            .filter(|id| id.as_str() != ORCHESTRATOR_AGENT_ID)
            .collect();
        agent_ids.sort();
        agent_ids.into_iter().map(|id| (id.as_str(), None)).collect()
    } else {
        requested_agents
            .iter()
            .map(|a| (a.agent_id.as_str(), a.task_override.as_deref()))
            .collect()
    };

    let mut sections = Vec::new();
    let mut chart_paths = Vec::new();
    for (agent_id, task_override) in agent_plan {
        let Some(agent) = session.agents.get(agent_id) else {
            continue;
        };
        if agent.status != AgentStatus::Completed {
            continue;
        }
        let agent_dir = ctx.workspace.agent_dir(&session.session_id, agent_id);
        let results = dr_workspace::files::read(&agent_dir, "results.md", None, None)
            .await
            .ok()
            .and_then(|v| v["content"].as_str().map(str::to_string))
            .unwrap_or_default();
        sections.push(format!(
            "## Agent {agent_id}: {}\n\n{results}",
            task_override.unwrap_or_else(|| agent.description.as_deref().unwrap_or(agent.task.as_str()))
        ));

        if let Ok(listing) = dr_workspace::files::list(&agent_dir, "charts").await {
            if let Some(entries) = listing["entries"].as_array() {
                for entry in entries {
                    if chart_paths.len() >= MAX_CHARTS {
                        break;
                    }
                    if let Some(name) = entry["name"].as_str() {
                        chart_paths.push(agent_dir.join("charts").join(name));
                    }
                }
            }
        }
    }

    if sections.is_empty() {
        return Err(ToolError::new(
            ToolErrorCode::ValidationFailed,
            "no completed agents to report on".to_string(),
            "wait for at least one agent to complete (wait_for_agents) before writing the report"
                .to_string(),
            true,
        ));
    }

    let chart_guide = if chart_paths.is_empty() {
        "No charts were produced.".to_string()
    } else {
        chart_paths
            .iter()
            .enumerate()
            .map(|(i, p)| format!("[chart {i}] {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut parts = vec![ContentPart::Text {
        text: format!(
            "Chart reference guide (cite charts by the exact name shown here):\n{chart_guide}\n\n\
             Agent findings:\n\n{}",
            sections.join("\n\n---\n\n")
        ),
    }];

    for path in &chart_paths {
        if let Ok(bytes) = tokio::fs::read(path).await {
            let media_type = media_type_for(path);
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            parts.push(ContentPart::Image {
                url: format!("data:{media_type};base64,{encoded}"),
                media_type: Some(media_type.to_string()),
            });
        }
    }

    let messages = vec![
        Message::system(
            "You are a research report writer. Synthesize the supplied agent findings and \
             charts into one cohesive markdown report with clear section headings. Reference \
             each chart inline with markdown image syntax, using the name from the chart \
             reference guide. Do not fabricate findings beyond what the agents reported.",
        ),
        Message {
            role: Role::User,
            content: MessageContent::Parts(parts),
        },
    ];

    let request = ChatRequest {
        messages,
        model,
        temperature: Some(0.3),
        ..Default::default()
    };

    let response = provider.chat(request).await.map_err(|e| {
        ToolError::new(
            ToolErrorCode::ApiError,
            e.to_string(),
            "retry write_report".to_string(),
            true,
        )
    })?;

    if response.content.trim().is_empty() {
        return Err(ToolError::new(
            ToolErrorCode::ValidationFailed,
            "report_writer returned an empty response".to_string(),
            "retry write_report".to_string(),
            true,
        ));
    }

    dr_workspace::files::write(session_dir, "final_report.md", &response.content).await?;

    Ok(format!(
        "wrote final_report.md ({} chars, {} chart(s) embedded)",
        response.content.len(),
        chart_paths.len()
    ))
}

fn media_type_for(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_defaults_to_png() {
        assert_eq!(media_type_for(Path::new("chart_0.png")), "image/png");
        assert_eq!(media_type_for(Path::new("chart_0.jpg")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("chart_0")), "image/png");
    }
}
