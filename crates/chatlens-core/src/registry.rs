//! Hostname-keyed adapter lookup.

use std::sync::Arc;

use tracing::debug;

use crate::adapters::{
    ChatGptAdapter, ClaudeAdapter, CopilotAdapter, MistralAdapter, PlatformAdapter,
};

/// The fixed set of supported platforms, resolvable by hostname or name.
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: vec![
                Arc::new(ChatGptAdapter::new()),
                Arc::new(ClaudeAdapter::new()),
                Arc::new(MistralAdapter::new()),
                Arc::new(CopilotAdapter::new()),
            ],
        }
    }

    /// Resolve by page hostname. Matching is substring containment so
    /// regional and www-prefixed hosts resolve to the same adapter.
    pub fn by_hostname(&self, hostname: &str) -> Option<Arc<dyn PlatformAdapter>> {
        let found = self.adapters.iter().find(|adapter| {
            adapter
                .config()
                .hostnames
                .iter()
                .any(|known| hostname.contains(known))
        });
        if found.is_none() {
            debug!(target: "chatlens::registry", hostname, "No adapter for hostname");
        }
        found.cloned()
    }

    /// Resolve by adapter name, exact match.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters
            .iter()
            .find(|adapter| adapter.name() == name)
            .cloned()
    }

    pub fn adapters(&self) -> &[Arc<dyn PlatformAdapter>] {
        &self.adapters
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_all_platform_hostnames() {
        let registry = AdapterRegistry::new();
        for (hostname, name) in [
            ("chatgpt.com", "chatgpt"),
            ("www.chatgpt.com", "chatgpt"),
            ("claude.ai", "claude"),
            ("chat.mistral.ai", "mistral"),
            ("copilot.microsoft.com", "copilot"),
        ] {
            let adapter = registry.by_hostname(hostname).unwrap();
            assert_eq!(adapter.name(), name, "hostname {hostname}");
        }
    }

    #[test]
    fn test_unknown_hostname_resolves_nothing() {
        let registry = AdapterRegistry::new();
        assert!(registry.by_hostname("example.com").is_none());
        assert!(registry.by_hostname("").is_none());
    }

    #[test]
    fn test_by_name_exact() {
        let registry = AdapterRegistry::new();
        assert!(registry.by_name("mistral").is_some());
        assert!(registry.by_name("Mistral").is_none());
        assert_eq!(registry.adapters().len(), 4);
    }
}
