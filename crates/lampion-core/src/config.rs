//! Configuration for the Lampion session service.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by every session of one service instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LampionConfig {
    /// Capacity of the event channel toward the calling layer
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// How long a targeted resolve may wait for an answer (seconds)
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_secs: u64,

    /// mDNS domain service types are qualified with
    #[serde(default = "default_domain")]
    pub default_domain: String,
}

impl Default for LampionConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            resolve_timeout_secs: default_resolve_timeout(),
            default_domain: default_domain(),
        }
    }
}

impl LampionConfig {
    /// Returns the resolve timeout as a Duration
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.event_capacity == 0 {
            return Err("event_capacity cannot be 0".to_string());
        }

        if self.resolve_timeout_secs == 0 {
            return Err("resolve_timeout_secs cannot be 0".to_string());
        }

        if self.default_domain.trim().is_empty() {
            return Err("default_domain cannot be empty".to_string());
        }

        Ok(())
    }
}

// Default configuration values
fn default_event_capacity() -> usize {
    1024
}

fn default_resolve_timeout() -> u64 {
    5
}

fn default_domain() -> String {
    "local.".to_string()
}
