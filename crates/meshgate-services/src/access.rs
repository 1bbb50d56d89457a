//! Denylist gate for node identifiers.

use meshgate_core::config::{GatewayConfig, DENYLIST_CAPACITY};

#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    enabled: bool,
    entries: Vec<u32>,
}

impl AccessGate {
    pub fn new(enabled: bool, entries: impl IntoIterator<Item = u32>) -> Self {
        Self {
            enabled,
            entries: entries.into_iter().take(DENYLIST_CAPACITY).collect(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.access.deny_enabled, config.denied_node_ids())
    }

    /// Node id 0 is never denied, even if listed.
    pub fn is_denied(&self, node_id: u32) -> bool {
        self.enabled && node_id != 0 && self.entries.contains(&node_id)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn entries(&self) -> &[u32] {
        &self.entries
    }
}
