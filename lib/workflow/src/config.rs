//! Engine configuration.
//!
//! Loaded by the binary through the `config` crate; every field has a
//! default so an empty source yields a usable engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine-wide defaults and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-attempt timeout for nodes that do not set their own, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Delay between attempts for nodes that do not set their own, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub default_retry_delay_ms: u64,

    /// Deepest recursion the walker allows. Bounds cyclic graphs.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Re-read the stored record before each node to observe external cancellation.
    #[serde(default = "default_check_cancellation")]
    pub check_cancellation: bool,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_max_depth() -> usize {
    256
}

fn default_check_cancellation() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            default_retry_delay_ms: default_retry_delay_ms(),
            max_depth: default_max_depth(),
            check_cancellation: default_check_cancellation(),
        }
    }
}

impl EngineConfig {
    /// Returns the default per-attempt timeout.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Returns the default delay between attempts.
    #[must_use]
    pub fn default_retry_delay(&self) -> Duration {
        Duration::from_millis(self.default_retry_delay_ms)
    }
}
