//! Drives a full session end to end through the public `Engine` façade,
//! with every LLM role backed by a scripted provider and search/sandbox
//! backed by the in-process stubs. Exercises the happy path (plan → spawn
//! → wait → collect → report) and the two failure invariants from the
//! orchestrator: no report written, and no tool calls on the first turn.

use std::sync::Arc;
use std::time::Duration;

use dr_domain::message::ProviderToolCall;
use dr_domain::model::{ApiKeys, EventPayload, ModelSelection, SessionStatus};
use dr_engine::{Engine, EngineContext};
use dr_providers::mock::{ScriptedLlmProvider, ScriptedTurn, StubSandboxProvider, StubSearchProvider};
use dr_providers::{ProviderRegistry, SandboxProvider, SearchProvider};

fn tool_call(id: &str, name: &str, args: serde_json::Value) -> ProviderToolCall {
    ProviderToolCall {
        call_id: id.into(),
        tool_name: name.into(),
        arguments: args,
    }
}

fn turn(tool_calls: Vec<ProviderToolCall>) -> ScriptedTurn {
    ScriptedTurn {
        content: String::new(),
        tool_calls,
        finish_reason: None,
    }
}

fn build_engine(
    orchestrator_turns: Vec<ScriptedTurn>,
    sub_agent_turns: Vec<ScriptedTurn>,
    report_turns: Vec<ScriptedTurn>,
    workspace_root: std::path::PathBuf,
) -> Engine {
    let mut providers: std::collections::HashMap<String, Arc<dyn dr_providers::LlmProvider>> =
        std::collections::HashMap::new();
    providers.insert(
        "orchestrator".into(),
        Arc::new(ScriptedLlmProvider::new("orchestrator", orchestrator_turns)),
    );
    providers.insert(
        "sub".into(),
        Arc::new(ScriptedLlmProvider::new("sub", sub_agent_turns)),
    );
    providers.insert(
        "report".into(),
        Arc::new(ScriptedLlmProvider::new("report", report_turns)),
    );
    let registry = ProviderRegistry::from_providers(providers);

    let search: Arc<dyn SearchProvider> = Arc::new(StubSearchProvider::new(Vec::new()));
    let sandbox: Arc<dyn SandboxProvider> = Arc::new(StubSandboxProvider::new(Default::default()));

    let ctx = Arc::new(EngineContext::new(
        Default::default(),
        registry,
        search,
        sandbox,
        workspace_root,
    ));
    Engine::new(ctx)
}

fn model_selection() -> ModelSelection {
    ModelSelection {
        orchestrator: "orchestrator/model".into(),
        planner: "missing/model".into(),
        summarizer: "missing/model".into(),
        report_writer: "report/model".into(),
        sub_agent: "sub/model".into(),
    }
}

fn api_keys() -> ApiKeys {
    ApiKeys {
        llm: "k".into(),
        search: "k".into(),
        sandbox: "k".into(),
    }
}

async fn drain_to_terminal(engine: &Engine, session_id: &str) -> SessionStatus {
    let mut events = engine.subscribe(session_id).unwrap();
    let mut saw_connected = false;
    let status = loop {
        let snapshot = engine.status(session_id).unwrap();
        if snapshot.status.is_terminal() {
            break snapshot.status;
        }
        match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Some(event)) => {
                if matches!(event.payload, EventPayload::Connected { .. }) {
                    saw_connected = true;
                }
            }
            Ok(None) => break engine.status(session_id).unwrap().status,
            Err(_) => panic!("session {session_id} did not reach a terminal status in time"),
        }
    };
    assert!(saw_connected, "subscribe never replayed the Connected backlog event");
    status
}

#[tokio::test]
async fn full_session_produces_a_report() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator_turns = vec![
        turn(vec![tool_call(
            "c1",
            "generate_plan",
            serde_json::json!({"steps": [{"description": "Survey the landscape"}]}),
        )]),
        turn(vec![tool_call(
            "c2",
            "spawn_agent",
            serde_json::json!({"task": "Survey the landscape"}),
        )]),
        turn(vec![tool_call(
            "c3",
            "wait_for_agents",
            serde_json::json!({"agent_ids": ["agent_1"], "timeout_seconds": 10}),
        )]),
        turn(vec![tool_call(
            "c4",
            "get_agent_result",
            serde_json::json!({"agent_id": "agent_1"}),
        )]),
        turn(vec![tool_call("c5", "write_report", serde_json::json!({}))]),
        turn(vec![]),
    ];
    let sub_agent_turns = vec![
        turn(vec![tool_call(
            "s1",
            "file",
            serde_json::json!({
                "operation": "write",
                "path": "results.md",
                "content": format!("# Results\n\n{}", "substantive finding ".repeat(20)),
                "description": "write findings"
            }),
        )]),
        turn(vec![]),
    ];
    let report_turns = vec![ScriptedTurn {
        content: "# Final Report\n\nThe landscape was surveyed thoroughly.".into(),
        tool_calls: vec![],
        finish_reason: None,
    }];

    let engine = build_engine(
        orchestrator_turns,
        sub_agent_turns,
        report_turns,
        dir.path().to_path_buf(),
    );

    let session_id = engine
        .create_session("Survey the landscape".into(), None, model_selection(), api_keys())
        .await
        .unwrap();

    let status = drain_to_terminal(&engine, &session_id).await;
    assert_eq!(status, SessionStatus::Completed);

    let report = engine.report(&session_id).await.unwrap();
    assert!(report.contains("Final Report"));

    let snapshot = engine.status(&session_id).unwrap();
    assert_eq!(snapshot.plan.len(), 1);
    assert_eq!(snapshot.agents.len(), 2); // pseudo-orchestrator + agent_1
}

#[tokio::test]
async fn session_fails_when_orchestrator_never_calls_a_tool() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator_turns = vec![ScriptedTurn {
        content: "I have nothing to do.".into(),
        tool_calls: vec![],
        finish_reason: None,
    }];
    let engine = build_engine(orchestrator_turns, vec![], vec![], dir.path().to_path_buf());

    let session_id = engine
        .create_session("pointless query".into(), None, model_selection(), api_keys())
        .await
        .unwrap();

    let status = drain_to_terminal(&engine, &session_id).await;
    assert_eq!(status, SessionStatus::Failed);
}

#[tokio::test]
async fn session_fails_when_no_report_is_written() {
    let dir = tempfile::tempdir().unwrap();
    // Plans, spawns nothing, and stops — never calls write_report.
    let orchestrator_turns = vec![
        turn(vec![tool_call(
            "c1",
            "generate_plan",
            serde_json::json!({"steps": [{"description": "Do something"}]}),
        )]),
        turn(vec![]),
    ];
    let engine = build_engine(orchestrator_turns, vec![], vec![], dir.path().to_path_buf());

    let session_id = engine
        .create_session("incomplete query".into(), None, model_selection(), api_keys())
        .await
        .unwrap();

    let status = drain_to_terminal(&engine, &session_id).await;
    assert_eq!(status, SessionStatus::Failed);

    let report = engine.report(&session_id).await.unwrap();
    assert_eq!(report, "no report yet");
}

#[tokio::test]
async fn create_session_rejects_empty_query_and_missing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(vec![], vec![], vec![], dir.path().to_path_buf());

    let empty_query = engine
        .create_session("   ".into(), None, model_selection(), api_keys())
        .await;
    assert!(empty_query.is_err());

    let missing_key = engine
        .create_session(
            "a real query".into(),
            None,
            model_selection(),
            ApiKeys { llm: "".into(), search: "k".into(), sandbox: "k".into() },
        )
        .await;
    assert!(missing_key.is_err());
}

#[tokio::test]
async fn cancel_is_idempotent_and_rejects_unknown_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(
        vec![turn(vec![])],
        vec![],
        vec![],
        dir.path().to_path_buf(),
    );

    let session_id = engine
        .create_session("cancel me".into(), None, model_selection(), api_keys())
        .await
        .unwrap();

    assert!(engine.cancel(&session_id, "user requested").is_ok());
    assert!(engine.cancel(&session_id, "again").is_ok());
    assert!(engine.cancel("no-such-session", "n/a").is_err());
}
