//! Retry delays.

use std::time::Duration;

use rand::Rng;

/// Share of the delay added as random jitter, at most.
const JITTER_RATIO: f64 = 0.10;

/// `min(base * 2^(attempt - 1), max)`, without jitter. `attempt` is 1-based.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent).min(max)
}

/// [`backoff_delay`] plus up to 10 % random jitter.
pub fn backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let delay = backoff_delay(attempt, base, max);
    let jitter_ms = (delay.as_millis() as f64 * JITTER_RATIO) as u64;
    if jitter_ms == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(2_000);
    const MAX: Duration = Duration::from_millis(300_000);

    #[test]
    fn test_delay_doubles_per_attempt() {
        assert_eq!(backoff_delay(1, BASE, MAX), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, BASE, MAX), Duration::from_secs(4));
        assert_eq!(backoff_delay(3, BASE, MAX), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_is_capped() {
        assert_eq!(backoff_delay(9, BASE, MAX), MAX);
        assert_eq!(backoff_delay(200, BASE, MAX), MAX);
    }

    #[test]
    fn test_attempt_zero_uses_base() {
        assert_eq!(backoff_delay(0, BASE, MAX), BASE);
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        for attempt in 1..10 {
            let plain = backoff_delay(attempt, BASE, MAX);
            let jittered = backoff(attempt, BASE, MAX);
            assert!(jittered >= plain);
            assert!(jittered <= plain + plain / 10);
        }
    }
}
