//! In-process stub adapters for the three capability interfaces.
//!
//! Used by `dr-engine`'s test scenarios and by operators who want to drive
//! the orchestration loop without external credentials. Each stub is driven
//! by a caller-supplied script so tests can assert on exact call sequences.

use crate::sandbox::{SandboxOutcome, SandboxProvider};
use crate::search::{SearchOptions, SearchProvider, SearchResponse, SearchResult};
use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use async_trait::async_trait;
use dr_domain::capability::LlmCapabilities;
use dr_domain::error::{Error, Result};
use dr_domain::message::ProviderToolCall;
use dr_domain::stream::{BoxStream, StreamEvent};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// A scripted chat response returned in sequence, one per call to `chat`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTurn {
    pub content: String,
    pub tool_calls: Vec<ProviderToolCall>,
    pub finish_reason: Option<String>,
}

/// An `LlmProvider` that plays back a fixed script of turns instead of
/// calling a real model. Calling `chat` past the end of the script
/// repeats the final turn — most test scenarios end with a terminal
/// no-tool-calls turn anyway.
pub struct ScriptedLlmProvider {
    id: String,
    capabilities: LlmCapabilities,
    turns: Mutex<VecDeque<ScriptedTurn>>,
    last: Mutex<Option<ScriptedTurn>>,
}

impl ScriptedLlmProvider {
    pub fn new(id: impl Into<String>, turns: Vec<ScriptedTurn>) -> Self {
        Self {
            id: id.into(),
            capabilities: LlmCapabilities {
                supports_tools: dr_domain::capability::ToolSupport::StrictJson,
                supports_streaming: true,
                supports_json_mode: true,
                supports_vision: true,
                context_window_tokens: Some(128_000),
                max_output_tokens: Some(8_192),
            },
            turns: Mutex::new(turns.into()),
            last: Mutex::new(None),
        }
    }

    fn next_turn(&self) -> ScriptedTurn {
        let mut queue = self.turns.lock();
        if let Some(turn) = queue.pop_front() {
            *self.last.lock() = Some(turn.clone());
            turn
        } else {
            self.last.lock().clone().unwrap_or_default()
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse> {
        let turn = self.next_turn();
        Ok(ChatResponse {
            content: turn.content,
            tool_calls: turn.tool_calls,
            usage: None,
            model: format!("{}-stub", self.id),
            finish_reason: turn.finish_reason,
        })
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let resp = self.chat(req).await?;
        let events = vec![
            Ok(StreamEvent::Token { text: resp.content }),
            Ok(StreamEvent::Done {
                usage: None,
                finish_reason: resp.finish_reason,
            }),
        ];
        Ok(Box::pin(futures_util::stream::iter(events)))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

/// A `SearchProvider` that returns a fixed set of results for every query,
/// or an error for the first N calls (used to test RateGate retry).
pub struct StubSearchProvider {
    results: Vec<SearchResult>,
    fail_first_n: Mutex<u32>,
}

impl StubSearchProvider {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            fail_first_n: Mutex::new(0),
        }
    }

    /// The first `n` calls return a retryable "rate limited" error.
    pub fn failing_first(results: Vec<SearchResult>, n: u32) -> Self {
        Self {
            results,
            fail_first_n: Mutex::new(n),
        }
    }
}

#[async_trait]
impl SearchProvider for StubSearchProvider {
    async fn search_with_contents(
        &self,
        _query: &str,
        _opts: &SearchOptions,
    ) -> Result<SearchResponse> {
        let mut remaining = self.fail_first_n.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(Error::Provider {
                provider: "stub-search".into(),
                message: "HTTP 429 - rate limited".into(),
            });
        }
        Ok(SearchResponse {
            results: self.results.clone(),
            autoprompt: None,
        })
    }
}

/// A `SandboxProvider` that never actually executes Python — it returns a
/// canned outcome, optionally an error, for every call.
pub struct StubSandboxProvider {
    outcome: SandboxOutcome,
}

impl StubSandboxProvider {
    pub fn new(outcome: SandboxOutcome) -> Self {
        Self { outcome }
    }
}

#[async_trait]
impl SandboxProvider for StubSandboxProvider {
    async fn run_python(&self, _code: &str, _timeout_ms: u64) -> Result<SandboxOutcome> {
        Ok(self.outcome.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_provider_plays_back_in_order() {
        let provider = ScriptedLlmProvider::new(
            "test",
            vec![
                ScriptedTurn {
                    content: "first".into(),
                    ..Default::default()
                },
                ScriptedTurn {
                    content: "second".into(),
                    ..Default::default()
                },
            ],
        );
        let r1 = provider.chat(ChatRequest::default()).await.unwrap();
        let r2 = provider.chat(ChatRequest::default()).await.unwrap();
        assert_eq!(r1.content, "first");
        assert_eq!(r2.content, "second");
    }

    #[tokio::test]
    async fn scripted_provider_repeats_last_turn_past_end() {
        let provider = ScriptedLlmProvider::new(
            "test",
            vec![ScriptedTurn {
                content: "only".into(),
                ..Default::default()
            }],
        );
        provider.chat(ChatRequest::default()).await.unwrap();
        let r2 = provider.chat(ChatRequest::default()).await.unwrap();
        assert_eq!(r2.content, "only");
    }

    #[tokio::test]
    async fn stub_search_fails_then_succeeds() {
        let provider = StubSearchProvider::failing_first(
            vec![SearchResult {
                title: "t".into(),
                url: "https://example.com".into(),
                text: "body".into(),
                author: None,
                published_date: None,
                score: None,
            }],
            2,
        );
        assert!(provider
            .search_with_contents("q", &SearchOptions::new())
            .await
            .is_err());
        assert!(provider
            .search_with_contents("q", &SearchOptions::new())
            .await
            .is_err());
        let ok = provider
            .search_with_contents("q", &SearchOptions::new())
            .await
            .unwrap();
        assert_eq!(ok.results.len(), 1);
    }

    #[tokio::test]
    async fn stub_sandbox_returns_canned_outcome() {
        let provider = StubSandboxProvider::new(SandboxOutcome::default());
        let outcome = provider.run_python("print(1)", 1000).await.unwrap();
        assert!(outcome.succeeded());
    }
}
