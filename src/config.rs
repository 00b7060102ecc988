//! Chain evaluation options
//!
//! Retry and wait budgets used by the chain executor. Hosts usually deserialize
//! these from their own configuration; `from_env` overlays environment values.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_RETRY_DELAY_MS: &str = "ELEMENT_CHAIN_RETRY_DELAY_MS";
pub const ENV_TOTAL_RETRY_TIMEOUT_MS: &str = "ELEMENT_CHAIN_TOTAL_RETRY_TIMEOUT_MS";
pub const ENV_PAGE_WAIT_TIMEOUT_MS: &str = "ELEMENT_CHAIN_PAGE_WAIT_TIMEOUT_MS";

/// Options applied when evaluating an element chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainOptions {
    /// Pause between failed attempts
    pub retry_delay_ms: u64,

    /// Wall-clock budget for a whole evaluation, retries included
    pub total_retry_timeout_ms: u64,

    /// Budget for a single page-readiness check (0 = bounded only by the retry budget)
    pub page_wait_timeout_ms: u64,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            retry_delay_ms: 100,
            total_retry_timeout_ms: 2000,
            page_wait_timeout_ms: 1000,
        }
    }
}

impl ChainOptions {
    /// Defaults, overridden by any `ELEMENT_CHAIN_*` environment variables that parse.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Some(value) = env_millis(ENV_RETRY_DELAY_MS) {
            options.retry_delay_ms = value;
        }
        if let Some(value) = env_millis(ENV_TOTAL_RETRY_TIMEOUT_MS) {
            options.total_retry_timeout_ms = value;
        }
        if let Some(value) = env_millis(ENV_PAGE_WAIT_TIMEOUT_MS) {
            options.page_wait_timeout_ms = value;
        }

        options
    }

    pub fn with_retry_delay_ms(mut self, value: u64) -> Self {
        self.retry_delay_ms = value;
        self
    }

    pub fn with_total_retry_timeout_ms(mut self, value: u64) -> Self {
        self.total_retry_timeout_ms = value;
        self
    }

    pub fn with_page_wait_timeout_ms(mut self, value: u64) -> Self {
        self.page_wait_timeout_ms = value;
        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn total_retry_timeout(&self) -> Duration {
        Duration::from_millis(self.total_retry_timeout_ms)
    }

    /// How long one readiness check may take. Zero falls back to the total retry budget.
    pub fn page_wait_budget(&self) -> Duration {
        if self.page_wait_timeout_ms == 0 {
            self.total_retry_timeout()
        } else {
            Duration::from_millis(self.page_wait_timeout_ms)
        }
    }
}

fn env_millis(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a whole number of milliseconds", name, raw);
            None
        }
    }
}
