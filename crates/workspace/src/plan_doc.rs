//! `orchestrator_plan.json` — the on-disk mirror of a session's plan,
//! written by the `generate_plan`/`update_plan` orchestrator tools.

use chrono::{DateTime, Utc};
use dr_domain::error::{Error, Result};
use dr_domain::model::PlanStep;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    pub session_id: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategic_perspective: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub steps: Vec<PlanStep>,
}

impl PlanDocument {
    pub async fn write(&self, session_dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(Error::Json)?;
        fs::write(session_dir.join("orchestrator_plan.json"), json)
            .await
            .map_err(Error::Io)
    }

    pub async fn read(session_dir: &Path) -> Result<Self> {
        let raw = fs::read_to_string(session_dir.join("orchestrator_plan.json"))
            .await
            .map_err(Error::Io)?;
        serde_json::from_str(&raw).map_err(Error::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();
        let doc = PlanDocument {
            session_id: "s1".into(),
            created: now,
            updated: now,
            query: "q".into(),
            clarification_context: None,
            strategic_perspective: Some("perspective".into()),
            reasoning: None,
            steps: vec![],
        };
        doc.write(dir.path()).await.unwrap();
        let loaded = PlanDocument::read(dir.path()).await.unwrap();
        assert_eq!(loaded.session_id, "s1");
        assert_eq!(loaded.strategic_perspective.as_deref(), Some("perspective"));
    }
}
