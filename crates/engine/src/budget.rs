//! Per-agent tool call budgets.
//!
//! A small mapping of `toolName → (calls, consecutiveFailures)` tracked
//! inside each running agent. A tool is blocked once its call count hits
//! its configured limit, or after 3 consecutive failures — whichever comes
//! first.

use std::collections::HashMap;

const CONSECUTIVE_FAILURE_LIMIT: u32 = 3;

#[derive(Debug, Clone, Copy, Default)]
struct ToolUsage {
    calls: u32,
    consecutive_failures: u32,
}

pub struct ToolBudget {
    limits: HashMap<&'static str, u32>,
    usage: HashMap<&'static str, ToolUsage>,
}

impl ToolBudget {
    pub fn new(limits: impl IntoIterator<Item = (&'static str, u32)>) -> Self {
        Self {
            limits: limits.into_iter().collect(),
            usage: HashMap::new(),
        }
    }

    /// Sub-agent budgets per §4.3: `web_search` 20, `file` 15,
    /// `code_interpreter` 5, `view_image` 5.
    pub fn sub_agent_defaults() -> Self {
        Self::new([
            ("web_search", 20),
            ("file", 15),
            ("code_interpreter", 5),
            ("view_image", 5),
        ])
    }

    /// Returns `true` when the tool is still within budget and has not hit
    /// the consecutive-failure block.
    pub fn allows(&self, tool_name: &str) -> bool {
        let Some(&limit) = self.limits.get(tool_name) else {
            return true;
        };
        let usage = self.usage.get(tool_name).copied().unwrap_or_default();
        usage.calls < limit && usage.consecutive_failures < CONSECUTIVE_FAILURE_LIMIT
    }

    pub fn limit_for(&self, tool_name: &str) -> Option<u32> {
        self.limits.get(tool_name).copied()
    }

    pub fn record_success(&mut self, tool_name: &'static str) {
        let entry = self.usage.entry(tool_name).or_default();
        entry.calls += 1;
        entry.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self, tool_name: &'static str) {
        let entry = self.usage.entry(tool_name).or_default();
        entry.calls += 1;
        entry.consecutive_failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_once_limit_reached() {
        let mut budget = ToolBudget::new([("web_search", 2)]);
        assert!(budget.allows("web_search"));
        budget.record_success("web_search");
        assert!(budget.allows("web_search"));
        budget.record_success("web_search");
        assert!(!budget.allows("web_search"));
    }

    #[test]
    fn blocks_after_consecutive_failures() {
        let mut budget = ToolBudget::new([("code_interpreter", 100)]);
        budget.record_failure("code_interpreter");
        budget.record_failure("code_interpreter");
        assert!(budget.allows("code_interpreter"));
        budget.record_failure("code_interpreter");
        assert!(!budget.allows("code_interpreter"));
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let mut budget = ToolBudget::new([("file", 100)]);
        budget.record_failure("file");
        budget.record_failure("file");
        budget.record_success("file");
        budget.record_failure("file");
        budget.record_failure("file");
        assert!(budget.allows("file"));
    }

    #[test]
    fn unconfigured_tool_is_unbounded() {
        let budget = ToolBudget::new([("web_search", 1)]);
        assert!(budget.allows("generate_plan"));
    }

    #[test]
    fn sub_agent_defaults_match_spec() {
        let budget = ToolBudget::sub_agent_defaults();
        assert_eq!(budget.limit_for("web_search"), Some(20));
        assert_eq!(budget.limit_for("file"), Some(15));
        assert_eq!(budget.limit_for("code_interpreter"), Some(5));
        assert_eq!(budget.limit_for("view_image"), Some(5));
    }
}
