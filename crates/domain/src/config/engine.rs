use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine — the knobs the orchestrator/sub-agent/session core reads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tunables for the session execution engine. Every field has a
/// documented default and may be partially overridden from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum gap between search-provider dispatches (ms).
    #[serde(default = "d_350")]
    pub min_search_spacing_ms: u64,
    /// Per-session concurrent agent cap.
    #[serde(default = "d_10")]
    pub max_agents: usize,
    /// Orchestrator outer-loop turn cap.
    #[serde(default = "d_100")]
    pub orchestrator_step_cap: u32,
    /// Sub-agent inner-loop turn cap per attempt.
    #[serde(default = "d_25")]
    pub sub_agent_step_cap: u32,
    /// Sub-agent max validation attempts before `failed`.
    #[serde(default = "d_3")]
    pub sub_agent_max_attempts: u32,
    /// Default `wait_for_agents` timeout (seconds).
    #[serde(default = "d_180")]
    pub wait_for_agents_timeout_sec: u64,
    /// Sandbox-side hard timeout for code_interpreter (ms).
    #[serde(default = "d_30000")]
    pub sandbox_timeout_ms: u64,
    /// Grace period before propagating cancellation when every
    /// subscriber disconnects (ms).
    #[serde(default = "d_5000")]
    pub abort_grace_period_ms: u64,
    /// Delay after session completion before the workspace directory
    /// is scheduled for deletion (ms).
    #[serde(default = "d_600000")]
    pub session_cleanup_delay_ms: u64,
    /// How long a terminal session is retained in the SessionStore
    /// before `CleanupOld` reaps it (seconds).
    #[serde(default = "d_86400")]
    pub session_retention_sec: u64,
    /// Bounded per-subscriber event channel capacity.
    #[serde(default = "d_256")]
    pub subscriber_channel_capacity: usize,
    /// Max retries per RateGate item on a retryable error.
    #[serde(default = "d_3")]
    pub rategate_max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_search_spacing_ms: d_350(),
            max_agents: d_10(),
            orchestrator_step_cap: d_100(),
            sub_agent_step_cap: d_25(),
            sub_agent_max_attempts: d_3(),
            wait_for_agents_timeout_sec: d_180(),
            sandbox_timeout_ms: d_30000(),
            abort_grace_period_ms: d_5000(),
            session_cleanup_delay_ms: d_600000(),
            session_retention_sec: d_86400(),
            subscriber_channel_capacity: d_256(),
            rategate_max_retries: d_3(),
        }
    }
}

fn d_350() -> u64 {
    350
}
fn d_10() -> usize {
    10
}
fn d_100() -> u32 {
    100
}
fn d_25() -> u32 {
    25
}
fn d_3() -> u32 {
    3
}
fn d_180() -> u64 {
    180
}
fn d_30000() -> u64 {
    30_000
}
fn d_5000() -> u64 {
    5_000
}
fn d_600000() -> u64 {
    600_000
}
fn d_86400() -> u64 {
    86_400
}
fn d_256() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.min_search_spacing_ms, 350);
        assert_eq!(cfg.max_agents, 10);
        assert_eq!(cfg.orchestrator_step_cap, 100);
        assert_eq!(cfg.sub_agent_step_cap, 25);
        assert_eq!(cfg.sub_agent_max_attempts, 3);
        assert_eq!(cfg.wait_for_agents_timeout_sec, 180);
        assert_eq!(cfg.sandbox_timeout_ms, 30_000);
        assert_eq!(cfg.abort_grace_period_ms, 5_000);
        assert_eq!(cfg.session_cleanup_delay_ms, 600_000);
        assert_eq!(cfg.session_retention_sec, 86_400);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.max_agents, 10);
    }

    #[test]
    fn deserialize_partial_override() {
        let cfg: EngineConfig = toml::from_str("max_agents = 4\nsandbox_timeout_ms = 5000").unwrap();
        assert_eq!(cfg.max_agents, 4);
        assert_eq!(cfg.sandbox_timeout_ms, 5000);
        assert_eq!(cfg.min_search_spacing_ms, 350);
    }
}
