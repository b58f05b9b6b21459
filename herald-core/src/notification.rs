//! # Notification
//!
//! A named event plus a payload, broadcast to zero or more listeners.
//!
//! The body lives behind an `Arc`, so cloning a notification for each
//! listener is O(1) and every listener observes the very same body.
//!
//! # Example
//!
//! ```rust,ignore
//! let tick = Notification::new("tick", json!({ "n": 1 }));
//! let copy = tick.clone(); // only bumps reference counts
//! assert!(copy.shares_body_with(&tick));
//! ```

use crate::message::Message;
use serde_json::Value;
use std::sync::Arc;

/// An immutable, cheaply cloneable notification.
///
/// Listeners receive `&Notification<B>` and never get exclusive access to the
/// body.
#[derive(Debug)]
pub struct Notification<B = Value> {
    name: Arc<str>,
    body: Arc<B>,
}

impl<B> Notification<B> {
    /// Create a new notification.
    pub fn new(name: impl Into<Arc<str>>, body: B) -> Self {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    /// Create a notification around an already shared body.
    pub fn from_shared(name: impl Into<Arc<str>>, body: Arc<B>) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// The event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The event name as a shared string.
    pub fn shared_name(&self) -> &Arc<str> {
        &self.name
    }

    /// The payload.
    pub fn body(&self) -> &B {
        &self.body
    }

    /// Returns `true` if both notifications point at the same body.
    pub fn shares_body_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl Notification<Value> {
    /// A notification with a `null` body.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, Value::Null)
    }
}

impl<B> Clone for Notification<B> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            body: Arc::clone(&self.body),
        }
    }
}

impl<B: Message> Message for Notification<B> {}
