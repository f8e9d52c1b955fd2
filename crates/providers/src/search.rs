//! Web search capability interface.
//!
//! Mirrors a neural-search API (Exa-shaped): a query plus options returns
//! ranked documents with extracted body text. No concrete HTTP-backed
//! adapter ships in this crate — operators wire in whichever provider they
//! have credentials for; [`mock::StubSearchProvider`](crate::mock) exists
//! for tests and credential-less smoke runs.

use async_trait::async_trait;
use dr_domain::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// `true` for semantic ranking, `false` for plain keyword matching.
    pub neural: bool,
    /// Only return documents published on or after this date (`YYYY-MM-DD`).
    pub published_after: Option<String>,
    /// Maximum number of results to return.
    pub num_results: u32,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self {
            neural: true,
            published_after: None,
            num_results: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    /// Extracted body text. Never forwarded verbatim to the calling LLM —
    /// the sub-agent tool layer routes it through the summarizer role first.
    pub text: String,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// The query the provider actually ran, when it rewrote the original
    /// (neural search autoprompting).
    pub autoprompt: Option<String>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search_with_contents(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<SearchResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_favor_neural_search() {
        let opts = SearchOptions::new();
        assert!(opts.neural);
        assert_eq!(opts.num_results, 8);
        assert!(opts.published_after.is_none());
    }
}
