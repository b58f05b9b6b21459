//! # Listener Handler
//!
//! The callable side of a subscription. A handler receives a shared reference
//! to a [`Notification`] and runs synchronously; the dispatcher decides when.
//!
//! # Usage Patterns
//!
//! 1. **Direct closure**: `|n: &Notification| { ... }`
//! 2. **Fallible closure**: `|n: &Notification| -> Result<(), MyError> { ... }`
//! 3. **Struct implementation**: `impl Handler for MyListener`

use crate::{error::BoxError, message::Message, notification::Notification, outcome::IntoOutcome};
use serde_json::Value;
use std::sync::Arc;

/// A listener callable registered for an event name.
///
/// Handlers must not assume exclusive access to the notification body and
/// must not depend on the order in which listeners of the same event run.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot handle notifications with a `{B}` body",
    label = "missing `Handler<{B}>` implementation",
    note = "Handlers must implement `handle`, or be a closure taking `&Notification<{B}>`."
)]
pub trait Handler<B: Message = Value>: Send + Sync + 'static {
    /// Handle a single notification.
    fn handle(&self, notification: &Notification<B>) -> Result<(), BoxError>;
}

// Blanket impl for closures
impl<F, B, R> Handler<B> for F
where
    B: Message,
    R: IntoOutcome,
    F: Fn(&Notification<B>) -> R + Send + Sync + 'static,
{
    fn handle(&self, notification: &Notification<B>) -> Result<(), BoxError> {
        (self)(notification).into_outcome()
    }
}

/// A shared, type-erased handler.
pub type SharedHandler<B = Value> = Arc<dyn Handler<B>>;
