//! Bounded polling for cluster conditions
//!
//! Every wait in the smoke test goes through [`eventually`]: probe, sleep a
//! fixed interval, probe again, until the condition holds or the deadline
//! (or attempt budget) runs out.
//!
//! # Example
//!
//! ```
//! use rbac_smoke::eventually::eventually;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), rbac_smoke::eventually::ConditionError> {
//! eventually(|| async { true })
//!     .timeout(Duration::from_secs(60))
//!     .interval(Duration::from_secs(1))
//!     .await_condition()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::trace;

/// Error type for eventually operations
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("condition not met after {attempts} attempts over {elapsed:?} (timeout {timeout:?})")]
    Timeout {
        attempts: u32,
        elapsed: Duration,
        timeout: Duration,
    },

    #[error("condition not met after {attempts} attempts (limit reached)")]
    AttemptsExhausted { attempts: u32, elapsed: Duration },
}

impl ConditionError {
    /// Time spent polling before giving up
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Timeout { elapsed, .. } | Self::AttemptsExhausted { elapsed, .. } => *elapsed,
        }
    }

    /// Number of probes made
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Timeout { attempts, .. } | Self::AttemptsExhausted { attempts, .. } => *attempts,
        }
    }
}

/// Builder for eventually checks
pub struct Eventually<F, Fut>
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    condition: F,
    timeout: Duration,
    interval: Duration,
    max_attempts: Option<u32>,
}

/// Create an eventually check that retries until condition is true
///
/// Default timeout: 30 seconds
/// Default interval: 1 second
/// No attempt limit unless [`Eventually::max_attempts`] is set.
pub fn eventually<F, Fut>(condition: F) -> Eventually<F, Fut>
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    Eventually {
        condition,
        timeout: Duration::from_secs(30),
        interval: Duration::from_secs(1),
        max_attempts: None,
    }
}

impl<F, Fut> Eventually<F, Fut>
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    /// Set the timeout duration
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Give up after this many probes even if the deadline is not reached
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Run the check, retrying until success, timeout or attempt limit
    pub async fn await_condition(self) -> Result<(), ConditionError> {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            // a probe that never resolves still ends at the deadline
            let remaining = self.timeout.saturating_sub(start.elapsed());
            match timeout(remaining, (self.condition)()).await {
                Ok(true) => {
                    trace!(attempts, elapsed = ?start.elapsed(), "Condition met");
                    return Ok(());
                }
                Ok(false) => {}
                Err(_) => {
                    return Err(ConditionError::Timeout {
                        attempts,
                        elapsed: start.elapsed(),
                        timeout: self.timeout,
                    });
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(ConditionError::Timeout {
                    attempts,
                    elapsed,
                    timeout: self.timeout,
                });
            }

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(ConditionError::AttemptsExhausted { attempts, elapsed });
            }

            sleep(self.interval).await;
        }
    }
}
