//! Root configuration, following the `#[serde(default = "d_fn")]` pattern
//! used throughout this codebase: every field names a default-value
//! function so a partially-specified TOML document (or none at all) still
//! produces a fully-populated, documented configuration.

mod engine;
mod observability;
mod providers;

pub use engine::EngineConfig;
pub use observability::ObservabilityConfig;
pub use providers::{AuthConfig, AuthMode, ModelsConfig, ProviderConfig, ProviderKind};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default = "d_workspace_root")]
    pub workspace_root: std::path::PathBuf,
    #[serde(default = "d_log_filter")]
    pub log_filter: String,
}

fn d_workspace_root() -> std::path::PathBuf {
    std::path::PathBuf::from("./reports")
}

fn d_log_filter() -> String {
    "info".into()
}

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> crate::error::Result<Self> {
        toml::from_str(s).map_err(|e| crate::error::Error::Config(e.to_string()))
    }

    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.providers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "providers".into(),
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("providers[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if !provider.base_url.is_empty()
                && !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }
            if !provider.id.is_empty() && !seen_ids.insert(&provider.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("providers[{i}].id"),
                    message: format!(
                        "duplicate provider id \"{}\" — later provider will shadow earlier one",
                        provider.id
                    ),
                });
            }
            let needs_credentials = matches!(provider.auth.mode, AuthMode::ApiKey);
            if needs_credentials {
                let has_env = provider.auth.env.as_ref().is_some_and(|v| !v.is_empty());
                let has_key = provider.auth.key.as_ref().is_some_and(|v| !v.is_empty());
                let has_keychain = provider.auth.service.is_some() && provider.auth.account.is_some();
                if !has_env && !has_key && !has_keychain {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("providers[{i}].auth"),
                        message: format!(
                            "provider \"{}\" uses ApiKey auth mode but has no auth.env, auth.key, or keychain service/account configured",
                            provider.id
                        ),
                    });
                }
            }
        }

        if self.engine.max_agents == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "engine.max_agents".into(),
                message: "max_agents must be greater than 0".into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            providers: vec![ProviderConfig {
                id: "anthropic".into(),
                kind: ProviderKind::Anthropic,
                base_url: "https://api.anthropic.com".into(),
                auth: AuthConfig {
                    mode: AuthMode::ApiKey,
                    env: Some("ANTHROPIC_API_KEY".into()),
                    ..AuthConfig::default()
                },
                default_model: None,
            }],
            ..Config::default()
        }
    }

    #[test]
    fn empty_toml_fully_populates_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.engine.max_agents, 10);
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.workspace_root, std::path::PathBuf::from("./reports"));
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn no_providers_is_warning() {
        let cfg = Config::default();
        let issues = cfg.validate();
        let issue = issues.iter().find(|e| e.field == "providers").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn api_key_mode_without_credentials_is_error() {
        let mut cfg = valid_config();
        cfg.providers[0].auth.env = None;
        let issues = cfg.validate();
        let issue = issues.iter().find(|e| e.field == "providers[0].auth").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn duplicate_provider_ids_is_warning() {
        let mut cfg = valid_config();
        cfg.providers.push(cfg.providers[0].clone());
        let issues = cfg.validate();
        assert!(issues.iter().any(|e| e.message.contains("duplicate provider id")));
    }
}
