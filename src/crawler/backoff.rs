use std::time::Duration;

/// Exponential retry delay: `base * 2^retry`, capped
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before retry number `retry` (0 = first retry)
    pub fn delay(&self, retry: u32) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let capped = base_ms
            .saturating_mul(2u64.saturating_pow(retry.min(20)))
            .min(max_ms);
        Duration::from_millis(capped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(10));
        assert_eq!(backoff.delay(0).as_millis(), 100);
        assert_eq!(backoff.delay(1).as_millis(), 200);
        assert_eq!(backoff.delay(2).as_millis(), 400);
    }

    #[test]
    fn test_max_cap() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(backoff.delay(10).as_millis(), 1000);
        assert_eq!(backoff.delay(u32::MAX).as_millis(), 1000);
    }
}
