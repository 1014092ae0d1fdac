use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::BackoffPolicy;
use crate::Error;
use crate::Result;

/// Upper bound for one subscription's lifetime (24h)
pub const MAX_WATCH_TIMEOUT_IN_SECS: u64 = 86_400;

/// Tuning of the cluster event watch loop
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Spawn the watch loop at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Lifetime of one subscription before the server ends it normally
    #[serde(default = "default_timeout_in_secs")]
    pub timeout_in_secs: u64,

    /// Delay between two subscriptions that ended normally;
    /// doubles per cycle from `base_delay_ms` up to `max_delay_ms`
    #[serde(default = "default_cooldown")]
    pub cooldown: BackoffPolicy,

    /// Pause before retrying after a failed snapshot or subscription
    #[serde(default = "default_error_retry_delay_ms")]
    pub error_retry_delay_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timeout_in_secs: default_timeout_in_secs(),
            cooldown: default_cooldown(),
            error_retry_delay_ms: default_error_retry_delay_ms(),
        }
    }
}

impl WatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_in_secs)
    }

    pub fn error_retry_delay(&self) -> Duration {
        Duration::from_millis(self.error_retry_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_in_secs == 0 || self.timeout_in_secs > MAX_WATCH_TIMEOUT_IN_SECS {
            return Err(Error::InvalidConfig(format!(
                "watch.timeout_in_secs must be within 1..={MAX_WATCH_TIMEOUT_IN_SECS}, got {}",
                self.timeout_in_secs
            )));
        }
        self.cooldown.validate("watch.cooldown")
    }
}

fn default_enabled() -> bool {
    true
}
fn default_timeout_in_secs() -> u64 {
    60
}
fn default_cooldown() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 0,
        timeout_ms: 0,
        base_delay_ms: 1_000,
        max_delay_ms: 30_000,
    }
}
fn default_error_retry_delay_ms() -> u64 {
    1_000
}
