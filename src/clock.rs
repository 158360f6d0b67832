//! # Time source abstraction.
//!
//! The kernel reads wall-clock time through [`Clock`] so that timestamps in
//! events, reports and timelines can be pinned in tests.
//!
//! - [`SystemClock`]: `SystemTime::now()`.
//! - [`ManualClock`]: starts at a fixed instant and only moves when told to.
//!
//! Elapsed durations are measured with `tokio::time::Instant`, so they follow
//! tokio's paused clock in tests rather than this trait.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Source of wall-clock timestamps.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// Shared clock handle.
pub type ClockRef = Arc<dyn Clock>;

/// Wall clock backed by [`SystemTime::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Deterministic clock for tests.
///
/// Cloning shares the underlying instant.
///
/// # Example
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
/// use plugvisor::{Clock, ManualClock};
///
/// let clock = ManualClock::new(UNIX_EPOCH);
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.now(), UNIX_EPOCH + Duration::from_secs(5));
/// ```
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<SystemTime>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }

    /// Sets the clock to `at`.
    pub fn set(&self, at: SystemTime) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}
