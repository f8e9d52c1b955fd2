//! Shared, process-wide handles every session's orchestrator and sub-agents
//! dispatch through: provider registry, the shared RateGate, the session
//! store, and the workspace manager. One `EngineContext` backs every
//! session created by a single `Engine`.

use std::sync::Arc;
use std::time::Duration;

use dr_domain::config::EngineConfig;
use dr_providers::{ProviderRegistry, SandboxProvider, SearchProvider};
use dr_sessions::SessionStore;
use dr_workspace::WorkspaceManager;

pub struct EngineContext {
    pub config: EngineConfig,
    pub providers: ProviderRegistry,
    pub search: Arc<dyn SearchProvider>,
    pub sandbox: Arc<dyn SandboxProvider>,
    pub search_gate: dr_providers::RateGate,
    pub sessions: Arc<SessionStore>,
    pub workspace: WorkspaceManager,
}

impl EngineContext {
    pub fn new(
        config: EngineConfig,
        providers: ProviderRegistry,
        search: Arc<dyn SearchProvider>,
        sandbox: Arc<dyn SandboxProvider>,
        workspace_root: impl Into<std::path::PathBuf>,
    ) -> Self {
        let search_gate = dr_providers::RateGate::new(
            Duration::from_millis(config.min_search_spacing_ms),
            config.rategate_max_retries,
        );
        Self {
            sessions: Arc::new(SessionStore::new(config.subscriber_channel_capacity)),
            workspace: WorkspaceManager::new(workspace_root),
            config,
            providers,
            search,
            sandbox,
            search_gate,
        }
    }
}
