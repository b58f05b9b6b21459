//! Notification dispatcher.
//!
//! A [`Dispatcher`] owns a [`ListenerRegistry`] and feeds a shared
//! [`DeliveryQueue`]. `notify` snapshots the subscriptions registered at call
//! time and appends one delivery task per subscription; it never runs a
//! listener itself.
//!
//! Several dispatchers (even with different body types) may share a queue, in
//! which case their deliveries interleave in global FIFO order.

use crate::{
    queue::{DeliveryQueue, DeliveryTask},
    registry::{ListenerRegistry, SubscriptionHandle},
};
use herald_core::{Handler, Message, Notification, SharedHandler, SubscriberId};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Sends notifications.
///
/// Implemented by [`Dispatcher`]; modules hold it as a trait object so they do
/// not depend on how delivery is scheduled.
pub trait Notifier<B: Message = Value>: Send + Sync {
    /// Schedule delivery of `notification`. Returns the number of listeners
    /// it was scheduled for.
    fn send(&self, notification: Notification<B>) -> usize;
}

/// Routes notifications by name to registered listeners.
///
/// Cloning is cheap; clones share the registry and the queue.
pub struct Dispatcher<B: Message = Value> {
    registry: Arc<RwLock<ListenerRegistry<B>>>,
    queue: DeliveryQueue,
}

impl<B: Message> Dispatcher<B> {
    /// Create a dispatcher with an empty registry on `queue`.
    pub fn new(queue: DeliveryQueue) -> Self {
        Self {
            registry: Arc::new(RwLock::new(ListenerRegistry::new())),
            queue,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ListenerRegistry<B>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ListenerRegistry<B>> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for `event` under `subscriber`.
    pub fn register<H: Handler<B>>(
        &self,
        event: impl Into<Arc<str>>,
        handler: H,
        subscriber: SubscriberId,
    ) -> SubscriptionHandle {
        self.write().register(event, handler, subscriber)
    }

    /// Register an already shared handler.
    pub fn register_shared(
        &self,
        event: impl Into<Arc<str>>,
        handler: SharedHandler<B>,
        subscriber: SubscriberId,
    ) -> SubscriptionHandle {
        self.write().register_shared(event, handler, subscriber)
    }

    /// Remove every subscription of `subscriber` under `event`.
    ///
    /// Deliveries already enqueued still run.
    pub fn remove(&self, event: &str, subscriber: SubscriberId) -> usize {
        self.write().remove(event, subscriber)
    }

    /// Remove exactly the subscription behind `handle`.
    pub fn remove_subscription(&self, handle: &SubscriptionHandle) -> bool {
        self.write().remove_subscription(handle)
    }

    /// Remove `subscriber` from every event.
    pub fn remove_subscriber(&self, subscriber: SubscriberId) -> usize {
        self.write().remove_subscriber(subscriber)
    }

    /// Returns `true` if `event` has at least one listener.
    pub fn has(&self, event: &str) -> bool {
        self.read().has(event)
    }

    /// Number of listeners for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.read().len_for(event)
    }

    /// Names that currently have listeners.
    pub fn events(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().event_names().map(str::to_owned).collect();
        names.sort();
        names
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Schedule delivery of `notification` to every listener registered now.
    ///
    /// Returns the number of deliveries enqueued; `0` when nobody listens.
    pub fn notify(&self, notification: Notification<B>) -> usize {
        let subscriptions = self.read().snapshot(notification.name());
        if subscriptions.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::trace!(event = notification.name(), "no listeners");
            return 0;
        }

        let tasks = subscriptions.into_iter().map(|subscription| {
            let notification = notification.clone();
            let handler = Arc::clone(subscription.handler());
            DeliveryTask::new(
                Arc::clone(subscription.event()),
                subscription.subscriber(),
                move || handler.handle(&notification),
            )
        });
        self.queue.enqueue(tasks)
    }

    /// Build a notification and schedule it.
    pub fn notify_with(&self, event: impl Into<Arc<str>>, body: B) -> usize {
        self.notify(Notification::new(event, body))
    }

    /// The queue deliveries go through.
    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }
}

impl<B: Message> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            queue: self.queue.clone(),
        }
    }
}

impl<B: Message> Notifier<B> for Dispatcher<B> {
    fn send(&self, notification: Notification<B>) -> usize {
        self.notify(notification)
    }
}
