//! Exponential backoff with jitter.
//!
//! `delay(attempt) = min(base * 2^(attempt - 1), max)`, perturbed by a
//! uniform draw in `±jitter_factor` of that value and clamped to `[0, max]`.
//! Attempts are 1-based: the delay after the first failed attempt is `base`.

use std::time::Duration;

use rand::Rng;

/// Compute the delay to wait after `attempt` failed, with random jitter.
///
/// `jitter_factor` is clamped to `0.0..=1.0`. With a factor of `0.0` the
/// result is exactly the capped exponential value.
pub fn delay(attempt: u32, base: Duration, max: Duration, jitter_factor: f64) -> Duration {
    let sample = if jitter_factor > 0.0 {
        rand::thread_rng().gen_range(-1.0..=1.0)
    } else {
        0.0
    };
    delay_with_sample(attempt, base, max, jitter_factor, sample)
}

/// Same as [`delay`], with the uniform draw supplied by the caller.
///
/// `sample` is expected in `-1.0..=1.0`; it scales the jitter window
/// (`-1.0` = shortest, `1.0` = longest).
pub fn delay_with_sample(
    attempt: u32,
    base: Duration,
    max: Duration,
    jitter_factor: f64,
    sample: f64,
) -> Duration {
    let raw = exponential(attempt, base, max);
    let jitter = jitter_factor.clamp(0.0, 1.0) * sample.clamp(-1.0, 1.0);
    if jitter == 0.0 {
        return raw;
    }
    let jittered = raw.as_secs_f64() * (1.0 + jitter);
    Duration::from_secs_f64(jittered.max(0.0)).min(max)
}

/// The capped exponential component, without jitter.
pub fn exponential(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1);
    base.saturating_mul(2u32.saturating_pow(exponent)).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_secs(5);

    #[test]
    fn first_attempt_waits_base() {
        assert_eq!(exponential(1, BASE, MAX), BASE);
        assert_eq!(delay(1, BASE, MAX, 0.0), BASE);
    }

    #[test]
    fn doubles_per_attempt() {
        assert_eq!(exponential(2, BASE, MAX), Duration::from_millis(200));
        assert_eq!(exponential(3, BASE, MAX), Duration::from_millis(400));
        assert_eq!(exponential(4, BASE, MAX), Duration::from_millis(800));
    }

    #[test]
    fn attempt_zero_treated_as_first() {
        assert_eq!(exponential(0, BASE, MAX), BASE);
    }

    #[test]
    fn capped_at_max() {
        assert_eq!(exponential(10, BASE, MAX), MAX);
        assert_eq!(exponential(u32::MAX, BASE, MAX), MAX);
    }

    #[test]
    fn jitter_window_bounds() {
        let low = delay_with_sample(3, BASE, MAX, 0.5, -1.0);
        let high = delay_with_sample(3, BASE, MAX, 0.5, 1.0);
        assert_eq!(low, Duration::from_millis(200));
        assert_eq!(high, Duration::from_millis(600));
    }

    #[test]
    fn jitter_never_exceeds_max() {
        for attempt in 1..20 {
            let d = delay_with_sample(attempt, BASE, MAX, 1.0, 1.0);
            assert!(d <= MAX, "attempt {attempt}: {d:?}");
        }
    }

    #[test]
    fn full_negative_jitter_clamps_to_zero() {
        assert_eq!(delay_with_sample(1, BASE, MAX, 1.0, -1.0), Duration::ZERO);
    }

    #[test]
    fn out_of_range_factor_is_clamped() {
        let d = delay_with_sample(1, BASE, MAX, 3.0, 1.0);
        assert_eq!(d, Duration::from_millis(200));
    }

    #[test]
    fn random_delay_stays_in_window() {
        for _ in 0..200 {
            let d = delay(2, BASE, MAX, 0.25);
            assert!(d >= Duration::from_millis(150), "{d:?}");
            assert!(d <= Duration::from_millis(250), "{d:?}");
        }
    }

    #[test]
    fn monotonic_below_cap() {
        let jitter = 0.2;
        for n in 1..5 {
            // Same draw on both sides: growth is at least (2 - jitter).
            for sample in [-1.0, -0.5, 0.0, 0.5, 1.0] {
                let a = delay_with_sample(n, BASE, MAX, jitter, sample);
                let b = delay_with_sample(n + 1, BASE, MAX, jitter, sample);
                assert!(
                    b.as_secs_f64() >= a.as_secs_f64() * (2.0 - jitter),
                    "n={n} sample={sample}: {a:?} -> {b:?}"
                );
            }
        }
    }
}
