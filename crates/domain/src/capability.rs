use serde::{Deserialize, Serialize};

/// LLM model capabilities — every {provider, model} advertises these.
/// The router uses capabilities to select models by role, not by provider name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCapabilities {
    pub supports_tools: ToolSupport,
    pub supports_streaming: bool,
    pub supports_json_mode: bool,
    pub supports_vision: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl Default for LlmCapabilities {
    fn default() -> Self {
        Self {
            supports_tools: ToolSupport::None,
            supports_streaming: false,
            supports_json_mode: false,
            supports_vision: false,
            context_window_tokens: None,
            max_output_tokens: None,
        }
    }
}

/// Tool support level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSupport {
    /// No tool calling support.
    None,
    /// Basic tool calling (function calling).
    Basic,
    /// Strict JSON schema-validated tool calling.
    StrictJson,
}

/// Model roles — a Session pins one model per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Drives the top-level tool-calling loop (plan → delegate → collect).
    Orchestrator,
    /// Produces the free-text "strategic perspective" consumed by the
    /// orchestrator verbatim.
    Planner,
    /// Condenses raw search results into the text handed back to a caller.
    Summarizer,
    /// Writes the final multimodal `final_report.md`.
    ReportWriter,
    /// Drives one sub-agent's research-task tool-calling loop.
    SubAgent,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Orchestrator => "orchestrator",
            ModelRole::Planner => "planner",
            ModelRole::Summarizer => "summarizer",
            ModelRole::ReportWriter => "report_writer",
            ModelRole::SubAgent => "sub_agent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_snake_case() {
        let json = serde_json::to_string(&ModelRole::ReportWriter).unwrap();
        assert_eq!(json, "\"report_writer\"");
    }
}
