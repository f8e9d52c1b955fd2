//! `dr research` — one-shot execution: create a session, stream its events
//! to stderr, and print the final report to stdout once it finishes.

use std::sync::Arc;

use dr_domain::config::Config;
use dr_domain::model::{ApiKeys, EventPayload};
use dr_engine::{Engine, EngineContext};
use dr_providers::mock::{StubSandboxProvider, StubSearchProvider};
use dr_providers::{ProviderRegistry, SandboxProvider, SearchProvider};

/// Builds an `Engine` from the resolved config.
///
/// Search and sandbox are wired to the in-process stubs shipped for
/// credential-less runs — a deployment that needs real web search or a real
/// Python sandbox supplies its own `SearchProvider`/`SandboxProvider` and
/// calls `EngineContext::new` directly instead of going through this binary.
pub fn build_engine(config: Config) -> Engine {
    let providers = ProviderRegistry::from_config(&config.providers);
    for err in providers.init_errors() {
        tracing::warn!(provider_id = %err.provider_id, error = %err.error, "provider failed to initialize");
    }

    let search: Arc<dyn SearchProvider> = Arc::new(StubSearchProvider::new(Vec::new()));
    let sandbox: Arc<dyn SandboxProvider> = Arc::new(StubSandboxProvider::new(Default::default()));

    let workspace_root = config.workspace_root.clone();
    let ctx = Arc::new(EngineContext::new(
        config.engine,
        providers,
        search,
        sandbox,
        workspace_root,
    ));
    Engine::new(ctx)
}

pub async fn run(
    engine: Engine,
    query: String,
    clarification: Option<String>,
    models: dr_domain::model::ModelSelection,
    print_events: bool,
) -> anyhow::Result<()> {
    let api_keys = ApiKeys {
        llm: "configured".to_string(),
        search: "configured".to_string(),
        sandbox: "configured".to_string(),
    };

    let session_id = engine
        .create_session(query, clarification, models, api_keys)
        .await?;
    eprintln!("session {session_id} started");

    let mut events = engine.subscribe(&session_id)?;

    while let Some(event) = events.recv().await {
        if print_events {
            if let Ok(json) = serde_json::to_string(&event) {
                eprintln!("{json}");
            }
        }
        if let EventPayload::SessionStatusChange { status } = event.payload {
            eprintln!("status: {status:?}");
        }
    }

    let report = engine.report(&session_id).await?;
    println!("{report}");

    let snapshot = engine.status(&session_id)?;
    if snapshot.status == dr_domain::model::SessionStatus::Failed {
        anyhow::bail!("session {session_id} failed");
    }
    Ok(())
}
