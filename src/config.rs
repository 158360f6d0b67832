//! # Kernel-wide configuration.
//!
//! Provides [`Config`] centralized defaults for the orchestrator.
//!
//! Config is used in two ways:
//! 1. **Orchestrator creation**: `Orchestrator::builder(config)`
//! 2. **Run defaults**: `RunOptions::with_defaults(&config)`
//!
//! ## Sentinel values
//! - `max_adapters = 0` → unlimited (no semaphore created)
//! - `timeout = 0s` → no per-dispatch timeout

use std::time::Duration;

use crate::delivery::QueueConfig;

/// Global configuration for the orchestration kernel.
///
/// ## Field semantics
/// - `max_adapters`: Concurrent adapter calls per run (`0` = unlimited)
/// - `timeout`: Default per-dispatch timeout (`0s` = no timeout)
/// - `bus_capacity`: Telemetry bus ring buffer size (min 1; clamped by Bus)
/// - `unit_duration`: Timeline unit used to compute schedule offsets
/// - `queue`: Delivery queue settings (retry budget, backoff, dedupe window)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over sprinkling sentinel
/// checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of adapter calls in flight within one run.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = at most `n` plugins dispatch simultaneously
    pub max_adapters: usize,

    /// Default dispatch timeout.
    ///
    /// An adapter call exceeding it is reported as `AdapterTimeout`.
    pub timeout: Duration,

    /// Capacity of the telemetry bus broadcast channel.
    pub bus_capacity: usize,

    /// Timeline unit: slot `i` starts at `i * unit_duration`.
    pub unit_duration: Duration,

    /// Delivery queue configuration.
    pub queue: QueueConfig,
}

impl Config {
    /// Returns the concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited (no semaphore)
    /// - `Some(n)` → at most `n` concurrent adapter calls
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_adapters == 0 {
            None
        } else {
            Some(self.max_adapters)
        }
    }

    /// Returns the default dispatch timeout as an `Option`.
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_adapters = 0` (unlimited)
    /// - `timeout = 30s`
    /// - `bus_capacity = 1024`
    /// - `unit_duration = 1s`
    /// - `queue = QueueConfig::default()` (3 attempts)
    fn default() -> Self {
        Self {
            max_adapters: 0,
            timeout: Duration::from_secs(30),
            bus_capacity: 1024,
            unit_duration: Duration::from_secs(1),
            queue: QueueConfig::default(),
        }
    }
}
