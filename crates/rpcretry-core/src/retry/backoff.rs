//! Backoff schedule: attempt number to wait duration.
//!
//! Pure computation only; the executor does the actual sleeping.

use std::time::Duration;

use rand::Rng;

use super::policy::{Jitter, RetryPolicy};

/// Delay to wait before making `attempt` (1-based).
///
/// The n-th retry waits `initial_backoff * multiplier^(n-1)`, capped at
/// `max_backoff`; so attempt 2 waits `initial_backoff`. No delay precedes
/// attempt 1. Jitter is not applied here.
pub fn delay_for(attempt: u32, policy: &RetryPolicy) -> Duration {
    if attempt < 2 {
        return Duration::ZERO;
    }
    let cap = policy.max_backoff();
    let exponent = (attempt - 2).min(i32::MAX as u32) as i32;
    let raw_nanos =
        policy.initial_backoff().as_nanos() as f64 * policy.backoff_multiplier().powi(exponent);
    if !raw_nanos.is_finite() || raw_nanos >= cap.as_nanos() as f64 {
        return cap;
    }
    let nanos = raw_nanos.round();
    if nanos < u64::MAX as f64 {
        return Duration::from_nanos(nanos as u64);
    }
    // Past u64 nanoseconds (about 584 years); go through seconds instead.
    Duration::try_from_secs_f64(nanos / 1e9).map_or(cap, |d| d.min(cap))
}

/// Delay before `attempt` with the policy's jitter mode applied.
pub fn next_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let delay = delay_for(attempt, policy);
    match policy.jitter() {
        Jitter::None => delay,
        Jitter::Full => full_jitter(delay, &mut rand::thread_rng()),
    }
}

/// Uniform draw from `[0, delay]`.
pub fn full_jitter<R: Rng + ?Sized>(delay: Duration, rng: &mut R) -> Duration {
    match u64::try_from(delay.as_nanos()) {
        Ok(0) => Duration::ZERO,
        Ok(nanos) => Duration::from_nanos(rng.gen_range(0..=nanos)),
        Err(_) => {
            let secs = delay.as_secs_f64() * rng.gen_range(0.0..=1.0);
            Duration::try_from_secs_f64(secs).map_or(delay, |d| d.min(delay))
        }
    }
}

/// Delays before attempts `2..=max_attempts`, without jitter.
pub fn schedule(policy: &RetryPolicy) -> Vec<Duration> {
    (2..=policy.max_attempts())
        .map(|attempt| delay_for(attempt, policy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Code;

    fn reference_policy() -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(5)
            .initial_backoff(Duration::from_millis(100))
            .max_backoff(Duration::from_secs(1))
            .backoff_multiplier(2.0)
            .retryable_code(Code::Unavailable)
            .build()
            .unwrap()
    }

    #[test]
    fn reference_schedule_is_exact() {
        assert_eq!(
            schedule(&reference_policy()),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
    }

    #[test]
    fn no_delay_before_first_attempt() {
        let p = reference_policy();
        assert_eq!(delay_for(0, &p), Duration::ZERO);
        assert_eq!(delay_for(1, &p), Duration::ZERO);
    }

    #[test]
    fn delay_is_capped() {
        let p = reference_policy();
        assert_eq!(delay_for(6, &p), Duration::from_secs(1));
        assert_eq!(delay_for(1000, &p), Duration::from_secs(1));
    }

    #[test]
    fn delays_beyond_u64_nanos_follow_the_formula() {
        let p = RetryPolicy::builder()
            .max_attempts(20)
            .initial_backoff(Duration::from_secs(1))
            .max_backoff(Duration::from_secs(u64::MAX / 2))
            .backoff_multiplier(10.0)
            .build()
            .unwrap();
        // 10^11 seconds is past u64::MAX nanoseconds but below the cap.
        assert_eq!(delay_for(13, &p), Duration::from_secs(100_000_000_000));
        assert_eq!(delay_for(u32::MAX, &p), Duration::from_secs(u64::MAX / 2));
    }

    #[test]
    fn multiplier_of_one_is_constant() {
        let p = RetryPolicy::builder()
            .max_attempts(4)
            .initial_backoff(Duration::from_millis(250))
            .max_backoff(Duration::from_secs(5))
            .backoff_multiplier(1.0)
            .build()
            .unwrap();
        assert_eq!(schedule(&p), vec![Duration::from_millis(250); 3]);
    }

    #[test]
    fn single_attempt_policy_has_empty_schedule() {
        assert!(schedule(&RetryPolicy::no_retry()).is_empty());
    }

    #[test]
    fn full_jitter_stays_within_delay() {
        let mut rng = rand::thread_rng();
        let delay = Duration::from_millis(400);
        for _ in 0..200 {
            assert!(full_jitter(delay, &mut rng) <= delay);
        }
        assert_eq!(full_jitter(Duration::ZERO, &mut rng), Duration::ZERO);
        for _ in 0..50 {
            assert!(full_jitter(Duration::MAX, &mut rng) <= Duration::MAX);
        }
    }

    #[test]
    fn next_delay_without_jitter_matches_formula() {
        let p = reference_policy();
        for attempt in 2..=5 {
            assert_eq!(next_delay(attempt, &p), delay_for(attempt, &p));
        }
    }
}
