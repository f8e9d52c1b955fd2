//! Provider registry.
//!
//! Constructs and holds all configured LLM provider instances. At startup the
//! registry reads the configured [`ProviderConfig`] list, resolves
//! authentication, and instantiates the appropriate adapter for each entry.

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use dr_domain::config::{ProviderConfig, ProviderKind};
use dr_domain::ModelRole;
use std::collections::HashMap;
use std::sync::Arc;

/// Holds all instantiated LLM providers and resolves them by role.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    init_errors: Vec<ProviderInitError>,
}

/// Records a provider that failed to initialize.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub error: String,
}

impl ProviderRegistry {
    /// Build the registry from the configured provider list.
    ///
    /// Providers that fail to initialize (missing credentials, bad
    /// base URL) are logged and skipped rather than aborting startup —
    /// a session that needs the failed provider for one of its roles
    /// surfaces that as a normal tool/session error when dispatched.
    pub fn from_config(providers: &[ProviderConfig]) -> Self {
        let mut built: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        let mut init_errors = Vec::new();

        for pc in providers {
            let result: dr_domain::error::Result<Arc<dyn LlmProvider>> = match pc.kind {
                ProviderKind::OpenaiCompat => OpenAiCompatProvider::from_config(pc)
                    .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
                ProviderKind::Anthropic => AnthropicProvider::from_config(pc)
                    .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
            };

            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, kind = ?pc.kind, "registered LLM provider");
                    built.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    tracing::warn!(provider_id = %pc.id, kind = ?pc.kind, error = %e, "failed to initialize LLM provider, skipping");
                    init_errors.push(ProviderInitError {
                        provider_id: pc.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Self {
            providers: built,
            init_errors,
        }
    }

    /// Build a registry directly from already-constructed providers, keyed
    /// by the id callers will reference in a `ModelSelection`. Used by
    /// tests and by embedders that build their own `LlmProvider`s instead
    /// of going through `from_config`.
    pub fn from_providers(providers: HashMap<String, Arc<dyn LlmProvider>>) -> Self {
        Self {
            providers,
            init_errors: Vec::new(),
        }
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Resolve the provider and model name for a role given the session's
    /// `ModelSelection`. Selection strings are `"provider_id/model"`; when
    /// no `/` is present the whole string is the provider id and the
    /// provider's own default model is used.
    pub fn for_role(
        &self,
        selection: &dr_domain::model::ModelSelection,
        role: ModelRole,
    ) -> Option<(Arc<dyn LlmProvider>, Option<String>)> {
        let spec = match role {
            ModelRole::Orchestrator => &selection.orchestrator,
            ModelRole::Planner => &selection.planner,
            ModelRole::Summarizer => &selection.summarizer,
            ModelRole::ReportWriter => &selection.report_writer,
            ModelRole::SubAgent => &selection.sub_agent,
        };
        let (provider_id, model) = match spec.split_once('/') {
            Some((p, m)) => (p, Some(m.to_string())),
            None => (spec.as_str(), None),
        };
        self.providers.get(provider_id).cloned().map(|p| (p, model))
    }

    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_yields_empty_registry() {
        let reg = ProviderRegistry::from_config(&[]);
        assert!(reg.is_empty());
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn unresolvable_role_spec_returns_none() {
        let reg = ProviderRegistry::from_config(&[]);
        let selection = dr_domain::model::ModelSelection {
            orchestrator: "missing/claude-x".into(),
            planner: "missing/claude-x".into(),
            summarizer: "missing/claude-x".into(),
            report_writer: "missing/claude-x".into(),
            sub_agent: "missing/claude-x".into(),
        };
        assert!(reg
            .for_role(&selection, ModelRole::Orchestrator)
            .is_none());
    }
}
