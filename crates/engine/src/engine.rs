//! `Engine` (§4.6): the front door. Every transport this crate is embedded
//! behind — the CLI, a future HTTP shell — drives sessions through this one
//! façade instead of touching `EngineContext`'s pieces directly.

use std::sync::Arc;

use dr_domain::model::{
    ApiKeys, Event, FlowGraph, ModelSelection, Session, SessionStatus,
};
use dr_domain::tool_error::ToolError;
use tokio::sync::mpsc;

use crate::context::EngineContext;
use crate::orchestrator::{self, OrchestratorJob};

const MAX_QUERY_CHARS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Full-session snapshot returned by [`Engine::status`]. Mirrors `Session`
/// minus its internal event log, which `subscribe` serves separately.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub query: String,
    pub clarification: Option<String>,
    pub status: SessionStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub agents: Vec<dr_domain::model::Agent>,
    pub plan: Vec<dr_domain::model::PlanStep>,
    pub flow: FlowGraph,
    pub event_count: usize,
    pub strategic_perspective: Option<String>,
}

pub struct FileBytes {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Owns the process-wide [`EngineContext`] and exposes the six operations a
/// caller needs: create a session, subscribe to its events, snapshot its
/// status, fetch its report, read an arbitrary file under it, and cancel it.
pub struct Engine {
    ctx: Arc<EngineContext>,
}

impl Engine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    /// Validates the request, creates the session and its workspace
    /// directory, and spawns the orchestrator as a detached background
    /// task. Returns the new session id immediately; the orchestrator runs
    /// to completion (or failure) independently of this call.
    pub async fn create_session(
        &self,
        query: String,
        clarification: Option<String>,
        models: ModelSelection,
        api_keys: ApiKeys,
    ) -> Result<String, EngineError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(EngineError::Validation("query must not be empty".into()));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(EngineError::Validation(format!(
                "query exceeds {MAX_QUERY_CHARS} characters"
            )));
        }
        for (name, key) in [
            ("llm", &api_keys.llm),
            ("search", &api_keys.search),
            ("sandbox", &api_keys.sandbox),
        ] {
            if key.trim().is_empty() {
                return Err(EngineError::Validation(format!(
                    "missing {name} api key"
                )));
            }
        }

        let session = self.ctx.sessions.create(query, clarification.clone(), models.clone(), api_keys.clone());
        self.ctx
            .workspace
            .create_session(&session.session_id)
            .await
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let cancel = self
            .ctx
            .sessions
            .cancel
            .get(&dr_sessions::cancel_key(&session.session_id))
            .unwrap_or_else(dr_domain::cancel::CancelToken::new);

        let job = OrchestratorJob {
            session_id: session.session_id.clone(),
            query: session.query.clone(),
            clarification,
            models,
            api_keys,
            cancel,
        };
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            orchestrator::run(ctx, job).await;
        });

        Ok(session.session_id)
    }

    pub fn subscribe(&self, session_id: &str) -> Result<mpsc::Receiver<Event>, EngineError> {
        self.ctx
            .sessions
            .subscribe(session_id)
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }

    pub fn status(&self, session_id: &str) -> Result<SessionSnapshot, EngineError> {
        let session = self
            .ctx
            .sessions
            .get(session_id)
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        Ok(snapshot(session))
    }

    /// Reads `final_report.md`. If absent but the session completed
    /// successfully, falls back to the largest non-worklog markdown file
    /// found anywhere under the session directory; otherwise returns a
    /// placeholder string rather than an error.
    pub async fn report(&self, session_id: &str) -> Result<String, EngineError> {
        let session = self
            .ctx
            .sessions
            .get(session_id)
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        let session_dir = self.ctx.workspace.session_dir(session_id);

        if let Ok(value) = dr_workspace::files::read(&session_dir, "final_report.md", None, None).await {
            if let Some(content) = value["content"].as_str() {
                return Ok(content.to_string());
            }
        }

        if session.status == SessionStatus::Completed {
            if let Some(path) = largest_markdown_under(&session_dir, "final_report.md").await {
                if let Ok(bytes) = tokio::fs::read(&path).await {
                    return Ok(String::from_utf8_lossy(&bytes).into_owned());
                }
            }
        }

        Ok("no report yet".to_string())
    }

    /// Returns raw bytes from under the session directory, after a
    /// path-containment check, with a content type derived from extension.
    pub async fn files(&self, session_id: &str, relative_path: &str) -> Result<FileBytes, EngineError> {
        if !self.ctx.sessions.exists(session_id) {
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        }
        let session_dir = self.ctx.workspace.session_dir(session_id);
        let resolved = dr_workspace::validate_path(&session_dir, relative_path)?;
        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|_| EngineError::FileNotFound(relative_path.to_string()))?;
        Ok(FileBytes {
            content_type: content_type_for(relative_path),
            bytes,
        })
    }

    /// Idempotent: cancelling an already-terminal session is a no-op inside
    /// `SessionStore::cancel_session`, which only emits a status transition
    /// away from a non-terminal status.
    pub fn cancel(&self, session_id: &str, reason: &str) -> Result<(), EngineError> {
        if !self.ctx.sessions.exists(session_id) {
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        }
        self.ctx.sessions.cancel_session(session_id, reason);
        Ok(())
    }
}

fn snapshot(session: Session) -> SessionSnapshot {
    let mut agents: Vec<_> = session.agents.into_values().collect();
    agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
    let mut plan: Vec<_> = session.plan.into_values().collect();
    plan.sort_by_key(|s| s.order.unwrap_or(u32::MAX));
    SessionSnapshot {
        session_id: session.session_id,
        query: session.query,
        clarification: session.clarification,
        status: session.status,
        created_at: session.created_at,
        updated_at: session.updated_at,
        event_count: session.events.len(),
        agents,
        plan,
        flow: session.flow,
        strategic_perspective: session.strategic_perspective,
    }
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("").to_lowercase().as_str() {
        "md" => "text/markdown",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" | "log" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Walks the session directory (bounded depth, since it's our own tree)
/// for the largest `.md` file other than the canonical report and anything
/// that looks like a running worklog rather than a finished artifact.
async fn largest_markdown_under(root: &std::path::Path, exclude: &str) -> Option<std::path::PathBuf> {
    let mut stack = vec![(root.to_path_buf(), 0u8)];
    let mut best: Option<(std::path::PathBuf, u64)> = None;

    while let Some((dir, depth)) = stack.pop() {
        if depth > 4 {
            continue;
        }
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else { continue };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Ok(metadata) = entry.metadata().await else { continue };
            if metadata.is_dir() {
                stack.push((path, depth + 1));
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".md") || name == exclude || name.to_lowercase().contains("worklog") {
                continue;
            }
            let size = metadata.len();
            if best.as_ref().map(|(_, s)| size > *s).unwrap_or(true) {
                best = Some((path, size));
            }
        }
    }

    best.map(|(path, _)| path)
}
