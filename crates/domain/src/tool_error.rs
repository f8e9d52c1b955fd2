//! The structured error taxonomy returned *to the calling LLM* from tool
//! dispatch (§7). Distinct from [`crate::error::Error`], which is used for
//! internal, non-LLM-facing plumbing faults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolErrorCode {
    ImageNotFound,
    FileNotFound,
    FileAccessDenied,
    SearchFailed,
    SearchRateLimited,
    CodeExecutionFailed,
    CodeExecutionTimeout,
    CodeSandboxError,
    AgentNotFound,
    AgentNotReady,
    AgentLimitReached,
    ToolCallLimitReached,
    ApiError,
    ApiKeyMissing,
    ValidationFailed,
    UnknownError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub error_code: ToolErrorCode,
    pub message: String,
    pub suggested_action: String,
    pub can_retry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.error_code, self.message)
    }
}

impl std::error::Error for ToolError {}

impl ToolError {
    pub fn new(
        code: ToolErrorCode,
        message: impl Into<String>,
        suggested_action: impl Into<String>,
        can_retry: bool,
    ) -> Self {
        Self {
            error_code: code,
            message: message.into(),
            suggested_action: suggested_action.into(),
            can_retry,
            retry_after_ms: None,
        }
    }

    pub fn with_retry_after(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }

    pub fn file_access_denied(path: impl std::fmt::Display) -> Self {
        Self::new(
            ToolErrorCode::FileAccessDenied,
            format!("path '{path}' escapes the allowed directory"),
            "use a path inside the permitted directory",
            false,
        )
    }

    pub fn file_not_found(path: impl std::fmt::Display) -> Self {
        Self::new(
            ToolErrorCode::FileNotFound,
            format!("no such file: '{path}'"),
            "check the path and retry",
            false,
        )
    }

    pub fn tool_call_limit_reached(tool_name: &str, limit: u32) -> Self {
        Self::new(
            ToolErrorCode::ToolCallLimitReached,
            format!("'{tool_name}' has reached its call budget of {limit}"),
            "wrap up and produce your results with the information already gathered",
            false,
        )
    }

    pub fn agent_not_ready(agent_id: &str) -> Self {
        Self::new(
            ToolErrorCode::AgentNotReady,
            format!("agent '{agent_id}' has not reached a terminal status yet"),
            "call wait_for_agents before requesting this agent's result",
            true,
        )
    }

    pub fn agent_limit_reached(limit: usize) -> Self {
        Self::new(
            ToolErrorCode::AgentLimitReached,
            format!("session has reached its agent cap of {limit}"),
            "wait for existing agents to finish before spawning more",
            false,
        )
    }
}

impl From<crate::error::Error> for ToolError {
    fn from(e: crate::error::Error) -> Self {
        use crate::error::Error;
        match e {
            Error::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::NotFound => {
                    Self::new(ToolErrorCode::FileNotFound, io_err.to_string(), "check the path and retry", false)
                }
                std::io::ErrorKind::PermissionDenied => {
                    Self::new(ToolErrorCode::FileAccessDenied, io_err.to_string(), "use a permitted path", false)
                }
                _ => Self::new(ToolErrorCode::UnknownError, io_err.to_string(), "retry the operation", true),
            },
            Error::Json(err) => Self::new(ToolErrorCode::ValidationFailed, err.to_string(), "fix the input and retry", false),
            Error::Http(msg) => Self::new(ToolErrorCode::ApiError, msg, "retry shortly", true),
            Error::Timeout(msg) => Self::new(ToolErrorCode::ApiError, msg, "retry with a longer timeout", true),
            Error::Provider { provider, message } => {
                Self::new(ToolErrorCode::ApiError, format!("{provider}: {message}"), "retry shortly", true)
            }
            Error::Config(msg) => Self::new(ToolErrorCode::UnknownError, msg, "fix the configuration", false),
            Error::Auth(msg) => Self::new(ToolErrorCode::ApiKeyMissing, msg, "provide valid credentials", false),
            Error::Other(msg) => Self::new(ToolErrorCode::UnknownError, msg, "retry the operation", false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ToolErrorCode::FileAccessDenied).unwrap();
        assert_eq!(json, "\"FILE_ACCESS_DENIED\"");
    }

    #[test]
    fn from_io_not_found_maps_to_file_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: ToolError = crate::error::Error::Io(io_err).into();
        assert_eq!(err.error_code, ToolErrorCode::FileNotFound);
        assert!(!err.can_retry);
    }

    #[test]
    fn tool_call_limit_reached_is_not_retryable() {
        let err = ToolError::tool_call_limit_reached("web_search", 20);
        assert_eq!(err.error_code, ToolErrorCode::ToolCallLimitReached);
        assert!(!err.can_retry);
    }
}
