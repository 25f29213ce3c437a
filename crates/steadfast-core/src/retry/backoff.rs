//! Exponential backoff with optional jitter.
//!
//! `base = initial * factor^(attempt - 1)`, capped at `max`. Jitter shifts the
//! base by up to ±25% and the result is clamped back into `[initial, max]`.

use super::policy::BackoffPolicy;
use rand::Rng;
use std::time::Duration;

/// Fraction of the base delay used as the jitter half-width.
const JITTER_RATIO: f64 = 0.25;

/// Un-jittered delay for a 1-based attempt number. Attempt 0 is treated as 1.
pub fn base_delay(attempt: u32, policy: &BackoffPolicy) -> Duration {
    Duration::from_millis(base_delay_ms(attempt, policy).round() as u64)
}

/// Delay before the given 1-based attempt.
///
/// Deterministic for a fixed `rng`; the RNG is only consulted when jitter is
/// enabled.
pub fn delay<R: Rng + ?Sized>(attempt: u32, policy: &BackoffPolicy, rng: &mut R) -> Duration {
    let initial = millis(policy.initial_delay());
    let max = millis(policy.max_delay());
    let base = base_delay_ms(attempt, policy);

    let jittered = if policy.jitter() {
        let spread = base * JITTER_RATIO;
        base + rng.gen_range(-spread..=spread)
    } else {
        base
    };

    Duration::from_millis(jittered.clamp(initial, max).round() as u64)
}

fn base_delay_ms(attempt: u32, policy: &BackoffPolicy) -> f64 {
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let grown = millis(policy.initial_delay()) * policy.factor().powi(exponent);
    // powi overflows to +inf for large attempts; min() folds that into the cap
    grown.min(millis(policy.max_delay()))
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn policy(jitter: bool) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(100),
            Duration::from_millis(5000),
            2.0,
            jitter,
        )
        .unwrap()
    }

    #[test]
    fn test_backoff_exponential() {
        let p = policy(false);
        assert_eq!(base_delay(1, &p), Duration::from_millis(100));
        assert_eq!(base_delay(2, &p), Duration::from_millis(200));
        assert_eq!(base_delay(3, &p), Duration::from_millis(400));
        assert_eq!(base_delay(4, &p), Duration::from_millis(800));
    }

    #[test]
    fn test_attempt_zero_treated_as_first() {
        let p = policy(false);
        assert_eq!(base_delay(0, &p), base_delay(1, &p));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let p = policy(false);
        assert_eq!(base_delay(10, &p), Duration::from_millis(5000));
        assert_eq!(base_delay(u32::MAX, &p), Duration::from_millis(5000));
    }

    #[test]
    fn test_delay_without_jitter_ignores_rng() {
        let p = policy(false);
        let mut a = StdRng::seed_from_u64(1);
        let mut b = StdRng::seed_from_u64(2);
        for attempt in 1..10 {
            assert_eq!(delay(attempt, &p, &mut a), delay(attempt, &p, &mut b));
        }
    }

    #[test]
    fn test_delay_is_monotonic_without_jitter() {
        let p = policy(false);
        let mut rng = StdRng::seed_from_u64(7);
        let mut previous = Duration::ZERO;
        for attempt in 1..64 {
            let d = delay(attempt, &p, &mut rng);
            assert!(d >= previous, "attempt {attempt}: {d:?} < {previous:?}");
            previous = d;
        }
    }

    #[test]
    fn test_jittered_delay_stays_in_bounds() {
        let p = policy(true);
        let mut rng = StdRng::seed_from_u64(42);
        for attempt in 0..40 {
            for _ in 0..50 {
                let d = delay(attempt, &p, &mut rng);
                assert!(d >= Duration::from_millis(100), "{d:?} below initial");
                assert!(d <= Duration::from_millis(5000), "{d:?} above max");
            }
        }
    }

    #[test]
    fn test_jitter_within_quarter_of_base() {
        let p = policy(true);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let d = delay(3, &p, &mut rng).as_millis();
            assert!((300..=500).contains(&d), "attempt 3 jittered to {d}ms");
        }
    }

    #[test]
    fn test_jitter_is_deterministic_for_seed() {
        let p = policy(true);
        let mut a = StdRng::seed_from_u64(1234);
        let mut b = StdRng::seed_from_u64(1234);
        for attempt in 1..20 {
            assert_eq!(delay(attempt, &p, &mut a), delay(attempt, &p, &mut b));
        }
    }
}
