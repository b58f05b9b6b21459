//! Listener registry: event name → ordered subscriptions.
//!
//! The table keeps one `Vec` per event name, in registration order. A name is
//! present if and only if it has at least one subscription; removing the last
//! one deletes the key.
//!
//! The registry itself is a plain data structure. [`Dispatcher`] wraps it in a
//! lock and snapshots it on every `notify`.
//!
//! [`Dispatcher`]: crate::dispatch::Dispatcher

use herald_core::{Handler, Message, SharedHandler, SubscriberId};
use serde_json::Value;
use std::{collections::HashMap, fmt, sync::Arc};

/// A handler bound to an event name under a subscriber identity.
pub struct Subscription<B: Message = Value> {
    event: Arc<str>,
    handler: SharedHandler<B>,
    subscriber: SubscriberId,
    key: u64,
}

impl<B: Message> Subscription<B> {
    /// Event name.
    pub fn event(&self) -> &Arc<str> {
        &self.event
    }

    /// The handler.
    pub fn handler(&self) -> &SharedHandler<B> {
        &self.handler
    }

    /// Removal key.
    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }

    /// Handle identifying exactly this subscription.
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            event: Arc::clone(&self.event),
            subscriber: self.subscriber,
            key: self.key,
        }
    }
}

impl<B: Message> Clone for Subscription<B> {
    fn clone(&self) -> Self {
        Self {
            event: Arc::clone(&self.event),
            handler: Arc::clone(&self.handler),
            subscriber: self.subscriber,
            key: self.key,
        }
    }
}

impl<B: Message> fmt::Debug for Subscription<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("subscriber", &self.subscriber)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Opaque handle returned by registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    event: Arc<str>,
    subscriber: SubscriberId,
    key: u64,
}

impl SubscriptionHandle {
    /// Event name the subscription was registered for.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Identity the subscription was registered under.
    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }
}

/// Mapping from event name to the subscriptions registered for it.
pub struct ListenerRegistry<B: Message = Value> {
    table: HashMap<Arc<str>, Vec<Subscription<B>>>,
    next_key: u64,
}

impl<B: Message> ListenerRegistry<B> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            next_key: 0,
        }
    }

    /// Append a subscription for `event`.
    ///
    /// Registering the same subscriber twice yields two deliveries per
    /// notification.
    pub fn register<H: Handler<B>>(
        &mut self,
        event: impl Into<Arc<str>>,
        handler: H,
        subscriber: SubscriberId,
    ) -> SubscriptionHandle {
        self.register_shared(event, Arc::new(handler), subscriber)
    }

    /// Append a subscription with an already shared handler.
    pub fn register_shared(
        &mut self,
        event: impl Into<Arc<str>>,
        handler: SharedHandler<B>,
        subscriber: SubscriberId,
    ) -> SubscriptionHandle {
        let event = event.into();
        let key = self.next_key;
        self.next_key += 1;

        let subscription = Subscription {
            event: Arc::clone(&event),
            handler,
            subscriber,
            key,
        };
        let handle = subscription.handle();
        self.table.entry(event).or_default().push(subscription);

        #[cfg(feature = "tracing")]
        tracing::trace!(event = %handle.event, %subscriber, "registered listener");

        handle
    }

    /// Remove every subscription under `event` registered by `subscriber`.
    ///
    /// Returns how many were removed. Unknown events and identities are a
    /// no-op.
    pub fn remove(&mut self, event: &str, subscriber: SubscriberId) -> usize {
        self.remove_where(event, |s| s.subscriber == subscriber)
    }

    /// Remove exactly the subscription behind `handle`.
    pub fn remove_subscription(&mut self, handle: &SubscriptionHandle) -> bool {
        self.remove_where(&handle.event, |s| s.key == handle.key) > 0
    }

    /// Remove `subscriber` from every event it listens to.
    pub fn remove_subscriber(&mut self, subscriber: SubscriberId) -> usize {
        let mut removed = 0;
        self.table.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|s| s.subscriber != subscriber);
            removed += before - subs.len();
            !subs.is_empty()
        });
        removed
    }

    fn remove_where(&mut self, event: &str, matches: impl Fn(&Subscription<B>) -> bool) -> usize {
        let Some(subs) = self.table.get_mut(event) else {
            return 0;
        };
        let before = subs.len();
        subs.retain(|s| !matches(s));
        let removed = before - subs.len();
        if subs.is_empty() {
            self.table.remove(event);
        }

        #[cfg(feature = "tracing")]
        if removed > 0 {
            tracing::trace!(event, removed, "removed listeners");
        }

        removed
    }

    /// Returns `true` if at least one subscription exists for `event`.
    pub fn has(&self, event: &str) -> bool {
        self.table.contains_key(event)
    }

    /// Number of subscriptions for `event`.
    pub fn len_for(&self, event: &str) -> usize {
        self.table.get(event).map_or(0, Vec::len)
    }

    /// Copy of the subscriptions for `event`, in registration order.
    pub fn snapshot(&self, event: &str) -> Vec<Subscription<B>> {
        self.table.get(event).cloned().unwrap_or_default()
    }

    /// Names that currently have listeners.
    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(|k| &**k)
    }

    /// Total number of subscriptions.
    pub fn len(&self) -> usize {
        self.table.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Drop every subscription.
    pub fn clear(&mut self) {
        self.table.clear();
    }
}

impl<B: Message> Default for ListenerRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::Notification;

    fn noop() -> impl Handler {
        |_n: &Notification| {}
    }

    #[test]
    fn test_register_and_has() {
        let mut registry: ListenerRegistry = ListenerRegistry::new();
        assert!(!registry.has("tick"));

        registry.register("tick", noop(), SubscriberId::new());
        assert!(registry.has("tick"));
        assert_eq!(registry.len_for("tick"), 1);
        assert_eq!(registry.len_for("tock"), 0);
    }

    #[test]
    fn test_no_deduplication() {
        let mut registry: ListenerRegistry = ListenerRegistry::new();
        let id = SubscriberId::new();
        registry.register("tick", noop(), id);
        registry.register("tick", noop(), id);
        assert_eq!(registry.len_for("tick"), 2);

        assert_eq!(registry.remove("tick", id), 2);
        assert!(!registry.has("tick"));
    }

    #[test]
    fn test_remove_keeps_other_subscribers() {
        let mut registry: ListenerRegistry = ListenerRegistry::new();
        let (a, b, c) = (SubscriberId::new(), SubscriberId::new(), SubscriberId::new());
        registry.register("tick", noop(), a);
        registry.register("tick", noop(), b);
        registry.register("tick", noop(), c);

        assert_eq!(registry.remove("tick", b), 1);
        let left: Vec<_> = registry.snapshot("tick").iter().map(|s| s.subscriber()).collect();
        assert_eq!(left, vec![a, c]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry: ListenerRegistry = ListenerRegistry::new();
        let id = SubscriberId::new();
        assert_eq!(registry.remove("missing", id), 0);

        registry.register("tick", noop(), SubscriberId::new());
        assert_eq!(registry.remove("tick", id), 0);
        assert!(registry.has("tick"));
    }

    #[test]
    fn test_register_then_remove_leaves_no_key() {
        let mut registry: ListenerRegistry = ListenerRegistry::new();
        let id = SubscriberId::new();
        registry.register("tick", noop(), id);
        registry.remove("tick", id);

        assert!(!registry.has("tick"));
        assert!(registry.is_empty());
        assert_eq!(registry.event_names().count(), 0);
    }

    #[test]
    fn test_remove_subscription_by_handle() {
        let mut registry: ListenerRegistry = ListenerRegistry::new();
        let id = SubscriberId::new();
        let first = registry.register("tick", noop(), id);
        registry.register("tick", noop(), id);

        assert!(registry.remove_subscription(&first));
        assert!(!registry.remove_subscription(&first));
        assert_eq!(registry.len_for("tick"), 1);
        assert_eq!(first.event(), "tick");
        assert_eq!(first.subscriber(), id);
    }

    #[test]
    fn test_remove_subscriber_everywhere() {
        let mut registry: ListenerRegistry = ListenerRegistry::new();
        let id = SubscriberId::new();
        let other = SubscriberId::new();
        registry.register("tick", noop(), id);
        registry.register("tock", noop(), id);
        registry.register("tock", noop(), other);

        assert_eq!(registry.remove_subscriber(id), 2);
        assert!(!registry.has("tick"));
        assert_eq!(registry.len_for("tock"), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut registry: ListenerRegistry = ListenerRegistry::new();
        let id = SubscriberId::new();
        registry.register("tick", noop(), id);

        let snapshot = registry.snapshot("tick");
        registry.remove("tick", id);
        assert_eq!(snapshot.len(), 1);
        assert!(!registry.has("tick"));
    }
}
