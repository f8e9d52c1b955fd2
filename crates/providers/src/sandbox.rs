//! Python sandbox capability interface.
//!
//! The sandbox runs a single Python source string to completion (or to
//! `timeout_ms`) and reports captured stdout/stderr plus any rendered
//! figures. No concrete subprocess-backed adapter ships in this crate —
//! [`mock::StubSandboxProvider`](crate::mock) exercises the tool layer
//! without a real interpreter; a production deployment wires in whatever
//! isolation story (container, microVM, restricted subprocess) its
//! operators trust.

use async_trait::async_trait;
use dr_domain::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SandboxArtifact {
    /// Base64-encoded PNG, when matplotlib produced a raster figure.
    pub png: Option<String>,
    /// Base64-encoded JPEG, when the figure was encoded as JPEG.
    pub jpeg: Option<String>,
    /// Plain-text representation (e.g. `repr()` of the last expression).
    pub text: Option<String>,
    /// Rendered HTML (e.g. a DataFrame's `_repr_html_`).
    pub html: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SandboxLogs {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxError {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SandboxOutcome {
    pub results: Vec<SandboxArtifact>,
    pub logs: SandboxLogs,
    pub error: Option<SandboxError>,
}

impl SandboxOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn run_python(&self, code: &str, timeout_ms: u64) -> Result<SandboxOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_without_error_succeeded() {
        let outcome = SandboxOutcome::default();
        assert!(outcome.succeeded());
    }

    #[test]
    fn outcome_with_error_not_succeeded() {
        let outcome = SandboxOutcome {
            error: Some(SandboxError {
                name: "ValueError".into(),
                value: "bad input".into(),
            }),
            ..Default::default()
        };
        assert!(!outcome.succeeded());
    }
}
