//! Session and agent directory lifecycle.
//!
//! Lays out `reports/<sessionId>/{agents/<agentId>/charts, artifacts/<agentId>}`
//! on session/agent creation, copies a finished agent's results and chart
//! images into the session's shared artifacts directory, and schedules
//! best-effort asynchronous deletion of the whole tree after completion.

use std::path::PathBuf;
use std::time::Duration;

use dr_domain::error::{Error, Result};
use dr_domain::trace::TraceEvent;
use tokio::fs;

pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    pub fn agent_dir(&self, session_id: &str, agent_id: &str) -> PathBuf {
        self.session_dir(session_id).join("agents").join(agent_id)
    }

    pub fn artifacts_dir(&self, session_id: &str, agent_id: &str) -> PathBuf {
        self.session_dir(session_id).join("artifacts").join(agent_id)
    }

    pub async fn create_session(&self, session_id: &str) -> Result<PathBuf> {
        let dir = self.session_dir(session_id);
        fs::create_dir_all(dir.join("agents")).await.map_err(Error::Io)?;
        fs::create_dir_all(dir.join("artifacts")).await.map_err(Error::Io)?;
        Ok(dir)
    }

    pub async fn create_agent(&self, session_id: &str, agent_id: &str) -> Result<PathBuf> {
        let dir = self.agent_dir(session_id, agent_id);
        fs::create_dir_all(dir.join("charts")).await.map_err(Error::Io)?;
        Ok(dir)
    }

    /// Copies `results.md` and every file under `charts/` from the agent's
    /// own directory into `artifacts/<agentId>/`, returning the
    /// session-relative paths of everything copied.
    pub async fn collect_agent_artifacts(&self, session_id: &str, agent_id: &str) -> Result<Vec<String>> {
        let agent_dir = self.agent_dir(session_id, agent_id);
        let dest = self.artifacts_dir(session_id, agent_id);
        fs::create_dir_all(&dest).await.map_err(Error::Io)?;
        let mut copied = Vec::new();

        let results = agent_dir.join("results.md");
        if fs::metadata(&results).await.is_ok() {
            fs::copy(&results, dest.join("results.md")).await.map_err(Error::Io)?;
            copied.push(format!("artifacts/{agent_id}/results.md"));
        }

        let charts = agent_dir.join("charts");
        if fs::metadata(&charts).await.is_ok() {
            let mut entries = fs::read_dir(&charts).await.map_err(Error::Io)?;
            while let Some(entry) = entries.next_entry().await.map_err(Error::Io)? {
                if entry.file_type().await.map_err(Error::Io)?.is_file() {
                    let name = entry.file_name();
                    fs::copy(entry.path(), dest.join(&name)).await.map_err(Error::Io)?;
                    copied.push(format!("artifacts/{agent_id}/{}", name.to_string_lossy()));
                }
            }
        }

        Ok(copied)
    }

    /// Schedules best-effort deletion of a session's directory tree after
    /// `delay`. Failure is logged, never propagated — nothing awaits this.
    pub fn schedule_cleanup(&self, session_id: &str, delay: Duration) {
        let dir = self.session_dir(session_id);
        let session_id = session_id.to_string();
        TraceEvent::WorkspaceCleanupScheduled {
            session_id: session_id.clone(),
            delay_ms: delay.as_millis() as u64,
        }
        .emit();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = fs::remove_dir_all(&dir).await {
                tracing::warn!(session_id = %session_id, error = %e, "failed to clean up session workspace");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn create_session_lays_out_subdirectories() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let dir = manager.create_session("s1").await.unwrap();
        assert!(dir.join("agents").is_dir());
        assert!(dir.join("artifacts").is_dir());
    }

    #[tokio::test]
    async fn create_agent_lays_out_charts_dir() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        manager.create_session("s1").await.unwrap();
        let dir = manager.create_agent("s1", "agent_1").await.unwrap();
        assert!(dir.join("charts").is_dir());
    }

    #[tokio::test]
    async fn collect_agent_artifacts_copies_results_and_charts() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        manager.create_session("s1").await.unwrap();
        let agent_dir = manager.create_agent("s1", "agent_1").await.unwrap();
        std::fs::write(agent_dir.join("results.md"), "# results").unwrap();
        std::fs::write(agent_dir.join("charts").join("plot.png"), b"\x89PNG").unwrap();

        let copied = manager.collect_agent_artifacts("s1", "agent_1").await.unwrap();
        assert_eq!(copied.len(), 2);
        assert!(manager.artifacts_dir("s1", "agent_1").join("results.md").exists());
        assert!(manager.artifacts_dir("s1", "agent_1").join("plot.png").exists());
    }

    #[tokio::test]
    async fn collect_agent_artifacts_tolerates_missing_files() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        manager.create_session("s1").await.unwrap();
        manager.create_agent("s1", "agent_1").await.unwrap();
        let copied = manager.collect_agent_artifacts("s1", "agent_1").await.unwrap();
        assert!(copied.is_empty());
    }

    #[tokio::test]
    async fn schedule_cleanup_removes_directory_after_delay() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let dir = manager.create_session("s1").await.unwrap();
        manager.schedule_cleanup("s1", Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!dir.exists());
    }
}
