//! Time source for retries, polling and deadlines.
//!
//! Components never call `tokio::time` directly; they sleep and read time
//! through an injected [`Clock`] so tests can run retry chains and
//! confirmation deadlines without real timers.

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Monotonic time plus the ability to wait.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock was created.
    fn now(&self) -> Duration;

    /// Suspend the calling flow for `duration`.
    async fn sleep(&self, duration: Duration);

    /// Wall-clock seconds since the Unix epoch.
    fn unix_time(&self) -> u64;
}

/// Real time, backed by Tokio timers.
#[derive(Debug)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn unix_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Virtual time: sleeping advances the clock immediately.
///
/// Shared by every flow holding it, so concurrent sleepers all push the same
/// timeline forward.
#[derive(Debug)]
pub struct ManualClock {
    elapsed: Mutex<Duration>,
    epoch_secs: u64,
}

impl ManualClock {
    /// Fixed start so `submitted_at` values are reproducible.
    pub const DEFAULT_EPOCH_SECS: u64 = 1_700_000_000;

    pub fn new() -> Self {
        Self::starting_at(Self::DEFAULT_EPOCH_SECS)
    }

    pub fn starting_at(epoch_secs: u64) -> Self {
        Self {
            elapsed: Mutex::new(Duration::ZERO),
            epoch_secs,
        }
    }

    /// Move virtual time forward.
    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        *elapsed += by;
    }

    /// Total virtual time slept so far.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }

    fn unix_time(&self) -> u64 {
        self.epoch_secs + self.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.sleep(Duration::from_secs(3)).await;
        clock.sleep(Duration::from_millis(500)).await;

        assert_eq!(clock.now(), Duration::from_millis(3500));
        assert_eq!(clock.unix_time(), ManualClock::DEFAULT_EPOCH_SECS + 3);
    }

    #[tokio::test]
    async fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let before = clock.now();
        clock.sleep(Duration::from_millis(5)).await;
        assert!(clock.now() >= before + Duration::from_millis(5));
        assert!(clock.unix_time() > ManualClock::DEFAULT_EPOCH_SECS);
    }
}
