use super::Backoff;

/// Waits the same amount of time before every retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedBackoff {
    delay_ms: u64,
}

impl FixedBackoff {
    pub fn new(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Backoff for FixedBackoff {
    fn base_delay_ms(&self) -> u64 {
        self.delay_ms
    }

    fn next_delay_ms(&self, _curr_delay_ms: u64) -> u64 {
        self.delay_ms
    }
}

/// Exponential backoff using a fixed-point multiplier
/// (`multiplier / multiplier_base`), capped at `max_delay_ms`.
///
/// `ExponentialBackoff::new(1000, 150, 100, 10_000)` waits 1000ms, 1500ms,
/// 2250ms and so on until it reaches 10s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base_delay_ms: u64,
    multiplier: u64,
    multiplier_base: u64,
    max_delay_ms: u64,
}

impl ExponentialBackoff {
    pub fn new(base_delay_ms: u64, multiplier: u64, multiplier_base: u64, max_delay_ms: u64) -> Self {
        assert!(multiplier_base != 0);
        Self {
            base_delay_ms,
            multiplier,
            multiplier_base,
            max_delay_ms,
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(1_000, 15, 10, 30_000)
    }
}

impl Backoff for ExponentialBackoff {
    fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms.min(self.max_delay_ms)
    }

    fn next_delay_ms(&self, curr_delay_ms: u64) -> u64 {
        (curr_delay_ms.saturating_mul(self.multiplier) / self.multiplier_base).min(self.max_delay_ms)
    }
}
