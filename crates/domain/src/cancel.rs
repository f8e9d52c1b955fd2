//! Cooperative cancellation primitives shared by the orchestrator, the
//! sub-agents it spawns, and the provider adapters that serve their LLM
//! calls.
//!
//! [`CancelToken`] is a cheap `Clone`-able flag. [`CancelMap`] layers
//! parent→child cascading on top: a session registers its orchestrator
//! token, every spawned sub-agent joins the orchestrator's group, and
//! calling [`CancelMap::cancel`] on the parent flips every token in the
//! group.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[derive(Default)]
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
    groups: Mutex<HashMap<String, HashSet<String>>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token for `key`, replacing any existing one.
    pub fn register(&self, key: impl Into<String>) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().unwrap().insert(key.into(), token.clone());
        token
    }

    pub fn get(&self, key: &str) -> Option<CancelToken> {
        self.tokens.lock().unwrap().get(key).cloned()
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.tokens
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|t| !t.is_cancelled())
    }

    /// Add `child` to `parent`'s cancellation group. Cancelling `parent`
    /// cascades to `child` (and everything else in the group).
    pub fn add_to_group(&self, parent: &str, child: &str) {
        self.groups
            .lock()
            .unwrap()
            .entry(parent.to_string())
            .or_default()
            .insert(child.to_string());
    }

    pub fn remove_from_group(&self, parent: &str, child: &str) {
        if let Some(set) = self.groups.lock().unwrap().get_mut(parent) {
            set.remove(child);
        }
    }

    /// Cancel `key` and cascade to every key registered in its group.
    pub fn cancel(&self, key: &str) {
        if let Some(token) = self.tokens.lock().unwrap().get(key) {
            token.cancel();
        }
        let children: Vec<String> = self
            .groups
            .lock()
            .unwrap()
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        let tokens = self.tokens.lock().unwrap();
        for child in children {
            if let Some(token) = tokens.get(&child) {
                token.cancel();
            }
        }
    }

    /// Drop the token for `key` and the group it owns (if any).
    pub fn remove(&self, key: &str) {
        self.tokens.lock().unwrap().remove(key);
        self.groups.lock().unwrap().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flips_flag() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn clone_shares_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cascade_cancels_group_children() {
        let map = CancelMap::new();
        let parent = map.register("orchestrator:s1");
        let child = map.register("agent:s1:agent_1");
        map.add_to_group("orchestrator:s1", "agent:s1:agent_1");

        assert!(!parent.is_cancelled());
        assert!(!child.is_cancelled());

        map.cancel("orchestrator:s1");

        assert!(parent.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[test]
    fn remove_from_group_stops_cascade() {
        let map = CancelMap::new();
        map.register("orchestrator:s1");
        let child = map.register("agent:s1:agent_1");
        map.add_to_group("orchestrator:s1", "agent:s1:agent_1");
        map.remove_from_group("orchestrator:s1", "agent:s1:agent_1");

        map.cancel("orchestrator:s1");
        assert!(!child.is_cancelled());
    }

    #[test]
    fn remove_cleans_up_token_and_group() {
        let map = CancelMap::new();
        map.register("s1");
        map.add_to_group("s1", "agent_1");
        map.remove("s1");
        assert!(map.get("s1").is_none());
        map.cancel("s1"); // must not panic with dangling group
    }

    #[test]
    fn is_running_reflects_cancellation() {
        let map = CancelMap::new();
        map.register("s1");
        assert!(map.is_running("s1"));
        map.cancel("s1");
        assert!(!map.is_running("s1"));
    }
}
