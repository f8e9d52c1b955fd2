//! `file` tool: a sub-agent-scoped variant restricted to exactly
//! `worklog.md`/`results.md`, and an orchestrator-scoped variant allowing
//! any path under the session directory. Both bottom out in
//! [`dr_workspace::files`] for the actual I/O and path containment.

use std::path::Path;

use dr_domain::tool_error::{ToolError, ToolErrorCode};
use serde::Deserialize;
use serde_json::Value;

const SUB_AGENT_ALLOWED: [&str; 2] = ["worklog.md", "results.md"];

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Read,
    Write,
    Append,
    List,
}

#[derive(Debug, Deserialize)]
pub struct FileToolInput {
    pub operation: FileOperation,
    pub path: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Converts literal `\n`/`\t` escape sequences in sub-agent-authored content
/// into real newline/tab characters before writing.
fn normalize_escapes(content: &str) -> String {
    content.replace("\\n", "\n").replace("\\t", "\t")
}

pub async fn sub_agent_file(agent_dir: &Path, input: FileToolInput) -> Result<Value, ToolError> {
    if !SUB_AGENT_ALLOWED.contains(&input.path.as_str()) {
        return Err(ToolError::file_access_denied(&input.path));
    }
    dispatch(agent_dir, input, true).await
}

pub async fn orchestrator_file(session_dir: &Path, input: FileToolInput) -> Result<Value, ToolError> {
    dispatch(session_dir, input, false).await
}

async fn dispatch(root: &Path, input: FileToolInput, normalize: bool) -> Result<Value, ToolError> {
    match input.operation {
        FileOperation::Read => dr_workspace::files::read(root, &input.path, input.offset, input.limit).await,
        FileOperation::Write => {
            let content = input.content.unwrap_or_default();
            let content = if normalize { normalize_escapes(&content) } else { content };
            dr_workspace::files::write(root, &input.path, &content).await
        }
        FileOperation::Append => {
            let content = input.content.unwrap_or_default();
            let content = if normalize { normalize_escapes(&content) } else { content };
            dr_workspace::files::append(root, &input.path, &content).await
        }
        FileOperation::List => dr_workspace::files::list(root, &input.path).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalize_escapes_converts_literal_sequences() {
        assert_eq!(normalize_escapes("line one\\nline two\\tindented"), "line one\nline two\tindented");
    }

    #[tokio::test]
    async fn sub_agent_file_rejects_paths_outside_allowlist() {
        let dir = TempDir::new().unwrap();
        let input = FileToolInput {
            operation: FileOperation::Write,
            path: "secrets.md".to_string(),
            content: Some("x".to_string()),
            offset: None,
            limit: None,
            description: None,
        };
        let err = sub_agent_file(dir.path(), input).await.unwrap_err();
        assert_eq!(err.error_code, ToolErrorCode::FileAccessDenied);
    }

    #[tokio::test]
    async fn sub_agent_file_allows_results_md() {
        let dir = TempDir::new().unwrap();
        let input = FileToolInput {
            operation: FileOperation::Write,
            path: "results.md".to_string(),
            content: Some("done".to_string()),
            offset: None,
            limit: None,
            description: None,
        };
        assert!(sub_agent_file(dir.path(), input).await.is_ok());
    }
}
