//! Dispatcher configuration.
//!
//! [`DispatchConfig`] controls the cooperative time slicing of the delivery
//! queue:
//!
//! - `max_sync`: how many listener invocations may run back to back. Once the
//!   queue-wide counter *exceeds* this value it is reset and the queue yields.
//! - `delay`: how long the queue yields for (`0` = hand control back once
//!   without sleeping).
//!
//! The configuration is fixed when the queue is built; change it by building a
//! new runtime.

use herald_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of synchronous deliveries per burst.
pub const DEFAULT_MAX_SYNC: usize = 5;

/// Default pause between two bursts.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(10);

/// Time slicing settings for a delivery queue.
///
/// Deserializes from `{ "max_sync": 5, "delay_ms": 10 }`; missing fields take
/// their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Deliveries allowed before the queue yields. Must be at least 1.
    pub max_sync: usize,

    /// Length of the yield between bursts.
    #[serde(rename = "delay_ms", with = "millis")]
    pub delay: Duration,
}

impl DispatchConfig {
    /// Create a configuration.
    pub const fn new(max_sync: usize, delay: Duration) -> Self {
        Self { max_sync, delay }
    }

    /// A configuration that never yields.
    pub const fn unbounded() -> Self {
        Self {
            max_sync: usize::MAX,
            delay: Duration::ZERO,
        }
    }

    /// Set `max_sync`.
    pub fn with_max_sync(mut self, max_sync: usize) -> Self {
        self.max_sync = max_sync;
        self
    }

    /// Set the delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns `true` when the queue will never yield.
    pub fn is_unbounded(&self) -> bool {
        self.max_sync == usize::MAX
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sync == 0 {
            return Err(ConfigError::InvalidMaxSync);
        }
        Ok(())
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SYNC, DEFAULT_DELAY)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(delay: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
