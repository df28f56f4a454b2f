//! Exponential backoff with jitter.
//!
//! Used between local retries of chain reads and between request-level
//! relay attempts.

use rand::Rng;
use std::time::Duration;

/// Delay before retry number `retry` (1-based); retry 0 waits nothing.
///
/// Doubles from `base_ms`, capped at `max_ms`, plus up to 10% jitter.
pub fn calculate_backoff(retry: u32, base_ms: u64, max_ms: u64) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let exponential = 2u64.saturating_pow(retry - 1);
    let capped_delay = base_ms.saturating_mul(exponential).min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let first = calculate_backoff(1, 200, 5000);
        assert!(first >= Duration::from_millis(200) && first < Duration::from_millis(220));

        let second = calculate_backoff(2, 200, 5000);
        assert!(second >= Duration::from_millis(400) && second < Duration::from_millis(440));
    }

    #[test]
    fn test_backoff_is_capped() {
        let capped = calculate_backoff(30, 200, 1000);
        assert!(capped >= Duration::from_millis(1000) && capped < Duration::from_millis(1100));
    }

    #[test]
    fn test_zero_retry_and_zero_base() {
        assert_eq!(calculate_backoff(0, 200, 1000), Duration::ZERO);
        assert_eq!(calculate_backoff(3, 0, 0), Duration::ZERO);
    }
}
