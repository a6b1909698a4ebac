//! Reconciliation loop configuration.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Default delay between reconciliation attempts.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 1_000;

/// Smallest delay the loop sleeps between attempts.
pub const MIN_RETRY_INTERVAL_MS: u64 = 10;

/// Configuration for the registration reconciliation loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Fixed delay between attempts in milliseconds.
    pub retry_interval_ms: u64,
    /// Write with compare-and-swap against the value read in the same attempt
    /// instead of last-writer-wins.
    pub conditional_write: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            conditional_write: false,
        }
    }
}

impl RegistrationConfig {
    /// Delay between attempts, never below [`MIN_RETRY_INTERVAL_MS`].
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms.max(MIN_RETRY_INTERVAL_MS))
    }
}
