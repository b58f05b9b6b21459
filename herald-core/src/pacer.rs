//! Yield seam used by the cooperative delivery queue.
//!
//! The delivery queue never sleeps by itself; between bursts it asks a
//! [`Pacer`] to pause. Implement this trait to plug in a different async
//! runtime, or to observe yields in tests without waiting on a real clock.

use futures::future::BoxFuture;
use std::time::Duration;

/// Performs the pause between two delivery bursts.
pub trait Pacer: Send + Sync + 'static {
    /// Pause for `delay`. A zero delay should still hand control back to the
    /// executor once.
    fn pause(&self, delay: Duration) -> BoxFuture<'static, ()>;
}
