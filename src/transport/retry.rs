use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::TransportError;

// ── Retry Configuration ──────────────────────────────────────

/// Hard ceiling on attempts per call, whatever the configuration asks for.
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per call, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Per-attempt timeout.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Fixed pause between two failed attempts.
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            timeout_ms: default_timeout(),
            backoff_ms: default_backoff(),
        }
    }
}

impl RetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

fn default_max_attempts() -> u32 {
    MAX_ATTEMPTS
}
fn default_timeout() -> u64 {
    5_000
}
fn default_backoff() -> u64 {
    1_000
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. The budget is clamped to `1..=MAX_ATTEMPTS`.
/// The last error is returned unchanged.
pub async fn with_retries<T, F, Fut>(config: &RetryConfig, url: &str, mut op: F) -> Result<T, TransportError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let max_attempts = config.max_attempts.clamp(1, MAX_ATTEMPTS);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if attempt >= max_attempts {
                    debug!(url, attempts = attempt, "exhausted transport retries");
                    return Err(e);
                }

                let wait = config.backoff();
                warn!(
                    url,
                    attempt,
                    max_attempts,
                    kind = %e.kind,
                    error = %e.cause,
                    "attempt failed, retrying in {:?}",
                    wait
                );
                sleep(wait).await;
            }
        }
    }
}
