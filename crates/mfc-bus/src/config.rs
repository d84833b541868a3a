//! Arbiter configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bus arbiter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// Bound on one transport round-trip and on opening a port. FLOW-BUS
    /// devices answer well inside this at 38400 baud.
    pub response_timeout: Duration,
    /// Queue length per port above which a warning is logged.
    pub queue_depth_warn: usize,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(500),
            queue_depth_warn: 32,
        }
    }
}
