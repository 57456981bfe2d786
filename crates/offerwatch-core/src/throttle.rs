//! Pacing between the sources of a sweep.
//!
//! The wait applies after every source except the last, whether the
//! previous source succeeded or failed.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use offerwatch_core::throttle::ThrottleConfig;
//!
//! let gap = ThrottleConfig::new(Duration::from_secs(2)).with_jitter(Duration::from_millis(250));
//! assert!(gap.effective_delay() < Duration::from_millis(2250));
//! ```

use std::time::Duration;

/// Delay applied between two consecutive sources of a sweep.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Fixed wait between sources.
    pub delay: Duration,

    /// Upper bound of the random extra wait; zero disables it.
    pub jitter: Duration,
}

impl ThrottleConfig {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    /// No waiting at all; used by one-off tools and tests.
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// The wait for one gap: `delay` plus a random share of `jitter`.
    pub fn effective_delay(&self) -> Duration {
        let bound = self.jitter.as_millis() as u64;
        match bound {
            0 => self.delay,
            _ => self.delay + Duration::from_millis(clock_noise() % bound),
        }
    }

    /// Sleep for one effective delay.
    pub async fn pause(&self) {
        let delay = self.effective_delay();
        if delay.is_zero() {
            return;
        }
        tracing::debug!(delay_ms = %delay.as_millis(), "Pausing before next source");
        tokio::time::sleep(delay).await;
    }
}

impl Default for ThrottleConfig {
    /// 3 seconds between sources, no jitter.
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

/// Xorshift over the clock's sub-second nanoseconds.
fn clock_noise() -> u64 {
    let nanos = chrono::Utc::now().timestamp_subsec_nanos() as u64;
    let mut x = nanos.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn fixed_gap_is_exact() {
        let gap = ThrottleConfig::new(Duration::from_secs(3));
        assert_eq!(gap.effective_delay(), Duration::from_secs(3));
        assert_eq!(ThrottleConfig::default().effective_delay(), Duration::from_secs(3));
    }

    #[test]
    fn jittered_gap_stays_in_range() {
        let gap = ThrottleConfig::new(Duration::from_millis(200))
            .with_jitter(Duration::from_millis(40));
        let lower = Duration::from_millis(200);
        let upper = Duration::from_millis(240);
        assert!(
            (0..50)
                .map(|_| gap.effective_delay())
                .all(|d| d >= lower && d < upper)
        );
    }

    #[tokio::test]
    async fn pause_sleeps_for_delay() {
        let config = ThrottleConfig::new(Duration::from_millis(50));
        let start = Instant::now();
        config.pause().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn none_does_not_sleep() {
        let start = Instant::now();
        ThrottleConfig::none().pause().await;
        assert!(start.elapsed() < Duration::from_millis(20));
    }
}
