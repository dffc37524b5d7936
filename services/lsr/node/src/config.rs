//! Per-node protocol configuration.

use serde::{Deserialize, Serialize};

/// Default interval between periodic refresh advertisements
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 1000;

/// Node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Milliseconds between periodic refresh advertisements
    pub heartbeat_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
        }
    }
}

impl NodeConfig {
    /// Configuration with the given heartbeat interval
    pub fn with_heartbeat(heartbeat_interval_ms: u64) -> Self {
        Self {
            heartbeat_interval_ms,
        }
    }
}
