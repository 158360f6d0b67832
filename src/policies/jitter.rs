//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] adds randomness to backoff delays so that handlers failing
//! together do not retry in lockstep.
//!
//! - [`JitterPolicy::None`] no randomization, predictable delays
//! - [`JitterPolicy::Additive`] delay + random[0, delay * ratio]
//!
//! Jitter only lengthens a delay: a retry never fires before its backoff base.

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of retry delays.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum JitterPolicy {
    /// No jitter: use exact backoff delay.
    #[default]
    None,

    /// Additive jitter: delay + random[0, delay * ratio].
    ///
    /// Negative or non-finite ratios behave like [`JitterPolicy::None`].
    Additive {
        /// Upper bound of the extra delay as a fraction of the base delay.
        ratio: f64,
    },
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match *self {
            JitterPolicy::None => delay,
            JitterPolicy::Additive { ratio } => additive_jitter(delay, ratio),
        }
    }
}

/// delay + random[0, delay * ratio]
fn additive_jitter(delay: Duration, ratio: f64) -> Duration {
    if !ratio.is_finite() || ratio <= 0.0 {
        return delay;
    }
    let spread_ms = (delay.as_millis() as f64 * ratio).min(u64::MAX as f64) as u64;
    if spread_ms == 0 {
        return delay;
    }
    delay.saturating_add(Duration::from_millis(rand::rng().random_range(0..=spread_ms)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn additive_never_shortens_the_delay() {
        let policy = JitterPolicy::Additive { ratio: 0.5 };
        let base = Duration::from_millis(200);
        for _ in 0..200 {
            let d = policy.apply(base);
            assert!(d >= base, "{d:?} < {base:?}");
            assert!(d <= Duration::from_millis(300), "{d:?} > 300ms");
        }
    }

    #[test]
    fn additive_with_bad_ratio_is_identity() {
        let base = Duration::from_millis(40);
        assert_eq!(JitterPolicy::Additive { ratio: -1.0 }.apply(base), base);
        assert_eq!(JitterPolicy::Additive { ratio: f64::NAN }.apply(base), base);
        assert_eq!(JitterPolicy::Additive { ratio: 0.0 }.apply(base), base);
    }

    #[test]
    fn zero_delay_stays_zero() {
        for policy in [JitterPolicy::None, JitterPolicy::Additive { ratio: 1.0 }] {
            assert_eq!(policy.apply(Duration::ZERO), Duration::ZERO);
        }
    }
}
