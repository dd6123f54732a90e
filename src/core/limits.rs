//! Bounds on a single triage invocation.
//!
//! The log read and the oracle call are the only blocking points; both are
//! capped so one stuck triage cannot stall the pipeline engine. The prompt
//! size is capped by keeping only the tail of long logs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits for one triage invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageLimits {
    /// Log read timeout in seconds (default: 5)
    #[serde(default = "default_log_read_timeout")]
    pub log_read_timeout_seconds: u64,

    /// Oracle request timeout in seconds (default: 60)
    #[serde(default = "default_oracle_timeout")]
    pub oracle_timeout_seconds: u64,

    /// Maximum log characters embedded in the prompt (default: 16000)
    #[serde(default = "default_max_log_chars")]
    pub max_log_chars: usize,
}

fn default_log_read_timeout() -> u64 {
    5
}
fn default_oracle_timeout() -> u64 {
    60
}
fn default_max_log_chars() -> usize {
    16_000
}

impl Default for TriageLimits {
    fn default() -> Self {
        Self {
            log_read_timeout_seconds: default_log_read_timeout(),
            oracle_timeout_seconds: default_oracle_timeout(),
            max_log_chars: default_max_log_chars(),
        }
    }
}

impl TriageLimits {
    pub fn log_read_timeout(&self) -> Duration {
        Duration::from_secs(self.log_read_timeout_seconds)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_seconds)
    }
}
