use std::time::Duration;

/// Capped exponential backoff for transient platform failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u8,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Creates a jittered policy. At least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u8, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: true,
        }
    }

    /// Creates a policy that retries without waiting.
    #[must_use]
    pub fn immediate(max_attempts: u8) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Returns the attempt budget per action.
    #[must_use]
    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    /// Returns the wait before attempt `failed_attempt + 1`.
    ///
    /// The un-jittered delay is `base * 2^(failed_attempt - 1)` capped at the
    /// maximum; jitter picks uniformly from the upper half of that delay.
    #[must_use]
    pub fn delay_after(&self, failed_attempt: u8) -> Duration {
        let exponent = u32::from(failed_attempt.saturating_sub(1)).min(16);
        let capped = self
            .base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay);

        if !self.jitter || capped.is_zero() {
            return capped;
        }

        let half = capped / 2;
        let spread = u64::try_from(half.as_millis()).unwrap_or(u64::MAX);
        if spread == 0 {
            return capped;
        }

        let mut bytes = [0_u8; 8];
        if getrandom::fill(&mut bytes).is_err() {
            return capped;
        }
        half + Duration::from_millis(u64::from_le_bytes(bytes) % (spread + 1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2), Duration::from_secs(30))
    }
}
