//! # Backoff policy for delivery retries.
//!
//! [`BackoffPolicy`] controls how retry delays grow after repeated handler failures.
//! It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for retry `n` is `first × factor^n`, clamped to `max`, then jitter is
//! applied. The base is derived from the retry number alone, so jitter output never
//! feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use plugvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(10),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(10));
//! assert_eq!(backoff.next(1), Duration::from_millis(20));
//! assert_eq!(backoff.next(20), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap for retries.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter applied on top of the clamped base.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `factor = 2.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Constant delay of `delay` with the given jitter.
    pub fn constant(delay: Duration, jitter: JitterPolicy) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter,
        }
    }

    /// Computes the delay for the given retry number (0-indexed).
    ///
    /// The base delay is `first × factor^retry`, clamped to [`BackoffPolicy::max`].
    /// With [`JitterPolicy::Additive`] the result may exceed `max` by the jitter spread.
    pub fn next(&self, retry: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = retry.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn retry_zero_returns_first() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_millis(100));
    }

    #[test]
    fn exponential_growth_without_jitter() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };

        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(3), Duration::from_millis(800));
        assert_eq!(policy.next(4), Duration::from_millis(1600));
    }

    #[test]
    fn constant_factor() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        for attempt in 0..10 {
            assert_eq!(
                policy.next(attempt),
                Duration::from_millis(500),
                "retry {} should be constant at 500ms",
                attempt
            );
        }
    }

    #[test]
    fn clamped_to_max() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(10), Duration::from_secs(1));
    }

    #[test]
    fn huge_retry_clamps_to_max() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(100), Duration::from_secs(60));
    }

    #[test]
    fn non_finite_overflow_clamps_to_max() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn additive_jitter_only_lengthens() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::Additive { ratio: 0.2 },
        };
        for retry in 0..6 {
            let base = Duration::from_millis(10 * 2u64.pow(retry));
            let delay = policy.next(retry);
            assert!(delay >= base, "retry {retry}: {delay:?} < {base:?}");
            assert!(delay <= base + base / 5, "retry {retry}: {delay:?} too long");
        }
    }

    #[test]
    fn constant_policy_ignores_retry_number() {
        let policy = BackoffPolicy::constant(Duration::from_millis(10), JitterPolicy::None);
        assert_eq!(policy.next(0), policy.next(7));
    }
}
