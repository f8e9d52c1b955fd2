//! `web_search` tool: dispatches through the shared `RateGate`, then routes
//! raw extracted text through the summarizer role before anything reaches
//! the calling LLM (§4.4.1). Raw `text` is never returned to a caller.

use std::sync::Arc;

use dr_domain::capability::ModelRole;
use dr_domain::error::Error as DomainError;
use dr_domain::message::{Message, MessageContent, Role};
use dr_domain::model::ModelSelection;
use dr_domain::tool_error::{ToolError, ToolErrorCode};
use dr_providers::rate_gate::RetryKind;
use dr_providers::search::SearchOptions;
use dr_providers::ChatRequest;
use serde::Deserialize;
use serde_json::Value;

use crate::context::EngineContext;

const SNIPPET_FALLBACK_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
pub struct WebSearchInput {
    pub query: String,
    #[serde(default)]
    pub num_results: Option<u32>,
    #[serde(default)]
    pub search_type: Option<String>,
    #[serde(default)]
    pub use_autoprompt: Option<bool>,
    #[serde(default)]
    pub start_published_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn web_search(
    ctx: &EngineContext,
    models: &ModelSelection,
    api_keys: &dr_domain::model::ApiKeys,
    input: WebSearchInput,
) -> Result<Value, ToolError> {
    let mut opts = SearchOptions::new();
    opts.neural = input.search_type.as_deref() != Some("keyword");
    opts.num_results = input.num_results.unwrap_or(8);
    opts.published_after = input.start_published_date.clone();
    let _ = input.use_autoprompt;

    let search = ctx.search.clone();
    let query = input.query.clone();
    let response = ctx
        .search_gate
        .dispatch(classify_search_error, || {
            let search = search.clone();
            let query = query.clone();
            let opts = opts.clone();
            async move { search.search_with_contents(&query, &opts).await }
        })
        .await
        .map_err(map_search_error)?;

    let summarized = summarize(ctx, models, api_keys, &input.query, &response.results).await;

    Ok(serde_json::json!({
        "query": input.query,
        "autoprompt": response.autoprompt,
        "summary": summarized,
        "results": response.results.iter().map(|r| serde_json::json!({
            "title": r.title,
            "url": r.url,
            "author": r.author,
            "published_date": r.published_date,
            "score": r.score,
        })).collect::<Vec<_>>(),
    }))
}

async fn summarize(
    ctx: &EngineContext,
    models: &ModelSelection,
    api_keys: &dr_domain::model::ApiKeys,
    query: &str,
    results: &[dr_providers::SearchResult],
) -> String {
    if results.is_empty() {
        return String::new();
    }

    let Some((provider, model)) = ctx.providers.for_role(models, ModelRole::Summarizer) else {
        return snippet_fallback(results);
    };
    let _ = api_keys;

    let body = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {} ({})\n{}", i + 1, r.title, r.url, r.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let system = Message {
        role: Role::System,
        content: MessageContent::Text(
            "Summarize the following search results for the query below. Preserve every \
             numerical figure, statistic, and date verbatim; do not round or omit them."
                .to_string(),
        ),
    };
    let user = Message {
        role: Role::User,
        content: MessageContent::Text(format!("Query: {query}\n\n{body}")),
    };

    let request = ChatRequest {
        messages: vec![system, user],
        model,
        temperature: Some(0.2),
        ..Default::default()
    };

    match provider.chat(request).await {
        Ok(resp) if !resp.content.trim().is_empty() => resp.content,
        _ => snippet_fallback(results),
    }
}

fn snippet_fallback(results: &[dr_providers::SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let snippet: String = r.text.chars().take(SNIPPET_FALLBACK_CHARS).collect();
            format!("[{}] {}: {snippet}", i + 1, r.title)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn classify_search_error(error: &DomainError) -> RetryKind {
    match error {
        DomainError::Provider { message, .. } => {
            let lower = message.to_lowercase();
            if lower.contains("429") || lower.contains("rate limit") {
                RetryKind::RateLimited { retry_after_ms: None }
            } else if lower.contains("500")
                || lower.contains("502")
                || lower.contains("503")
                || lower.contains("504")
            {
                RetryKind::Standard
            } else {
                RetryKind::None
            }
        }
        DomainError::Http(_) | DomainError::Timeout(_) => RetryKind::Standard,
        _ => RetryKind::None,
    }
}

fn map_search_error(error: DomainError) -> ToolError {
    match classify_search_error(&error) {
        RetryKind::RateLimited { .. } => ToolError::new(
            ToolErrorCode::SearchRateLimited,
            error.to_string(),
            "wait and retry, or continue with other sources".to_string(),
            true,
        ),
        _ => ToolError::new(
            ToolErrorCode::SearchFailed,
            error.to_string(),
            "retry the search or try a different query".to_string(),
            true,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_fallback_truncates_long_text() {
        let results = vec![dr_providers::SearchResult {
            title: "t".into(),
            url: "https://example.com".into(),
            text: "x".repeat(1000),
            author: None,
            published_date: None,
            score: None,
        }];
        let snippet = snippet_fallback(&results);
        assert!(snippet.len() < 1000);
    }
}
