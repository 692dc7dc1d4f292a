//! Retry backoff computation.
//!
//! Pure delay math for the client's retry policy. Exponential base with
//! random jitter to prevent thundering herd when many clients recover
//! from the same outage.

use std::time::Duration;

/// Exponential backoff with bounded jitter.
///
/// The base delay doubles per attempt up to `max_delay`; every delay adds
/// up to `jitter` of random slack. The pre-jitter curve is monotonic
/// non-decreasing in the attempt count.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff curve.
    pub fn new(base_delay: Duration, max_delay: Duration, jitter: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter,
        }
    }

    /// The delay before retry number `attempt` (0-based), jitter included.
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.min(16);
        let base_ms = self
            .base_delay
            .as_millis()
            .saturating_mul(1u128 << shift)
            .min(self.max_delay.as_millis());
        let base = Duration::from_millis(base_ms as u64);
        base + self.random_jitter()
    }

    /// The delay before retry number `attempt` without jitter. This is
    /// the monotonic part of the curve.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.min(16);
        let base_ms = self
            .base_delay
            .as_millis()
            .saturating_mul(1u128 << shift)
            .min(self.max_delay.as_millis());
        Duration::from_millis(base_ms as u64)
    }

    fn random_jitter(&self) -> Duration {
        let bound = self.jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        let mut bytes = [0u8; 8];
        if getrandom::getrandom(&mut bytes).is_err() {
            return Duration::ZERO;
        }
        let random = u64::from_le_bytes(bytes);
        Duration::from_millis(random % (bound + 1))
    }
}

impl Default for ExponentialBackoff {
    /// 250ms base, 30s cap, up to 1s jitter.
    fn default() -> Self {
        Self::new(
            Duration::from_millis(250),
            Duration::from_secs(30),
            Duration::from_secs(1),
        )
    }
}
