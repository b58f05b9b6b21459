//! Named component cache.
//!
//! Proxies, mediators and commands are all module instances registered under
//! a unique name. A single cache handles the three kinds: it constructs the
//! instance, wires it to the dispatcher, runs its lifecycle methods and
//! announces the change.
//!
//! Lifecycle methods, all optional:
//!
//! | method                | when                                                          |
//! |-----------------------|---------------------------------------------------------------|
//! | `initialize`          | at construction, with the registration arguments              |
//! | `on_attach`           | after the notifier is attached, with the component name        |
//! | `interests`           | a name, an array of names or `null`; queried before `on_attach` |
//! | `handle_notification` | once per delivery, with the notification name and body        |
//! | `on_detach`           | on removal, after the subscriptions are gone                  |
//!
//! After attaching, `{kind}:attached` is published with `{ "name": .. }`;
//! after removal, `{kind}:detached`.

use herald_core::{BoxError, HeraldError, ModuleError, Notification, RegistryError, SubscriberId};
use herald_std::{
    DeliveryTask, Dispatcher,
    module::{ModuleDef, ModuleInstance},
};
use serde_json::{Value, json};
use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak},
};

/// Called after the instance is wired to the dispatcher.
pub const ON_ATTACH: &str = "on_attach";
/// Called after the instance is unsubscribed.
pub const ON_DETACH: &str = "on_detach";
/// Returns the notification names to subscribe to.
pub const INTERESTS: &str = "interests";
/// Receives subscribed notifications.
pub const HANDLE_NOTIFICATION: &str = "handle_notification";

/// The flavor of a named component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    /// Owns a slice of application data.
    Proxy,
    /// Mediates between the application and a view.
    Mediator,
    /// Executes in response to a notification.
    Command,
}

impl ComponentKind {
    /// Lowercase name, used in notification names and errors.
    pub const fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Proxy => "proxy",
            ComponentKind::Mediator => "mediator",
            ComponentKind::Command => "command",
        }
    }

    /// Name published after a component of this kind is attached.
    pub fn attached_event(self) -> String {
        format!("{}:attached", self.as_str())
    }

    /// Name published after a component of this kind is removed.
    pub fn detached_event(self) -> String {
        format!("{}:detached", self.as_str())
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered component.
pub type SharedInstance = Arc<Mutex<ModuleInstance>>;

type Key = (ComponentKind, String);

struct Slot {
    id: SubscriberId,
    instance: SharedInstance,
}

/// Cache of named module instances.
///
/// Cloning is cheap; clones share the cache.
#[derive(Clone)]
pub struct Components {
    dispatcher: Dispatcher,
    entries: Arc<Mutex<BTreeMap<Key, Slot>>>,
}

impl Components {
    /// An empty cache publishing through `dispatcher`.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            entries: Arc::default(),
        }
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<Key, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Construct `def` and register it as `kind` under `name`.
    ///
    /// Fails with [`RegistryError::DuplicateRegistration`] if the name is
    /// taken; remove the existing component first. `interests` is queried
    /// before `on_attach`, so a component rejected for its interests has not
    /// published anything. If `on_attach` fails the name is released again.
    pub fn register(
        &self,
        kind: ComponentKind,
        name: &str,
        def: &Arc<ModuleDef>,
        config: Option<&Value>,
        args: &[Value],
    ) -> Result<SharedInstance, HeraldError> {
        let key = (kind, name.to_owned());
        if self.entries().contains_key(&key) {
            return Err(duplicate(kind, name).into());
        }

        let mut instance = def.construct(config, args)?;
        instance.attach_notifier(Arc::new(self.dispatcher.clone()));
        let interests = interests(&mut instance)?;
        let id = instance.id();
        let shared = Arc::new(Mutex::new(instance));

        {
            let mut entries = self.entries();
            if entries.contains_key(&key) {
                return Err(duplicate(kind, name).into());
            }
            entries.insert(
                key.clone(),
                Slot {
                    id,
                    instance: Arc::clone(&shared),
                },
            );
        }

        {
            let mut instance = lock(&shared);
            if instance.responds_to(ON_ATTACH) {
                if let Err(err) = instance.invoke(ON_ATTACH, &[json!(name)]) {
                    instance.detach_notifier();
                    self.entries().remove(&key);
                    return Err(err.into());
                }
            }
        }

        for event in interests {
            let target = Arc::downgrade(&shared);
            self.dispatcher
                .register(event, move |notification: &Notification| deliver(&target, notification), id);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(kind = kind.as_str(), name, "component attached");

        self.dispatcher
            .notify_with(kind.attached_event(), json!({ "name": name }));
        Ok(shared)
    }

    /// Unregister `name`, run its `on_detach` and announce the removal.
    ///
    /// The teardown always completes: subscriptions are dropped, the notifier
    /// is detached and `{kind}:detached` is published even when `on_detach`
    /// fails, in which case its error is returned afterwards.
    ///
    /// When the instance is busy, typically because the call comes from its
    /// own `handle_notification`, the subscriptions are dropped right away and
    /// the rest of the teardown is queued behind the running delivery. A
    /// failing `on_detach` is then reported through the queue's failure
    /// callback.
    pub fn remove(&self, kind: ComponentKind, name: &str) -> Result<SharedInstance, HeraldError> {
        let Slot { id, instance: shared } = self
            .entries()
            .remove(&(kind, name.to_owned()))
            .ok_or_else(|| RegistryError::NotFound {
                kind: kind.as_str(),
                name: name.to_owned(),
            })?;
        self.dispatcher.remove_subscriber(id);

        let detached = match shared.try_lock() {
            Ok(mut instance) => teardown(&mut instance, kind, name, &self.dispatcher),
            Err(TryLockError::Poisoned(poisoned)) => {
                teardown(&mut poisoned.into_inner(), kind, name, &self.dispatcher)
            }
            Err(TryLockError::WouldBlock) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(kind = kind.as_str(), name, "component busy, deferring detach");

                let target = Arc::clone(&shared);
                let dispatcher = self.dispatcher.clone();
                let name = name.to_owned();
                self.dispatcher.queue().push(DeliveryTask::new(
                    Arc::from(kind.detached_event()),
                    id,
                    move || {
                        teardown(&mut lock(&target), kind, &name, &dispatcher)?;
                        Ok(())
                    },
                ));
                Ok(())
            }
        };

        detached?;
        Ok(shared)
    }

    /// Look up a component.
    pub fn get(&self, kind: ComponentKind, name: &str) -> Option<SharedInstance> {
        self.entries()
            .get(&(kind, name.to_owned()))
            .map(|slot| Arc::clone(&slot.instance))
    }

    /// Returns `true` if `name` is registered as `kind`.
    pub fn has(&self, kind: ComponentKind, name: &str) -> bool {
        self.entries().contains_key(&(kind, name.to_owned()))
    }

    /// Names registered as `kind`, sorted.
    pub fn names(&self, kind: ComponentKind) -> Vec<String> {
        self.entries()
            .keys()
            .filter(|(entry_kind, _)| *entry_kind == kind)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Total number of components.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl fmt::Debug for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Components")
            .field("entries", &self.entries().keys().collect::<Vec<_>>())
            .finish()
    }
}

fn duplicate(kind: ComponentKind, name: &str) -> RegistryError {
    RegistryError::DuplicateRegistration {
        kind: kind.as_str(),
        name: name.to_owned(),
    }
}

fn lock(shared: &SharedInstance) -> MutexGuard<'_, ModuleInstance> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn interests(instance: &mut ModuleInstance) -> Result<Vec<String>, ModuleError> {
    if !instance.responds_to(INTERESTS) {
        return Ok(Vec::new());
    }
    let module = instance.def().qualified_name().to_owned();
    let unexpected = || ModuleError::UnexpectedReturn {
        module: module.clone(),
        method: INTERESTS.to_owned(),
        expected: "a notification name or an array of names",
    };
    match instance.invoke(INTERESTS, &[])? {
        Value::Null => Ok(Vec::new()),
        Value::String(name) => Ok(vec![name]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(name) => Ok(name),
                _ => Err(unexpected()),
            })
            .collect(),
        _ => Err(unexpected()),
    }
}

fn teardown(
    instance: &mut ModuleInstance,
    kind: ComponentKind,
    name: &str,
    dispatcher: &Dispatcher,
) -> Result<(), ModuleError> {
    let detached = if instance.responds_to(ON_DETACH) {
        instance.invoke(ON_DETACH, &[json!(name)]).map(drop)
    } else {
        Ok(())
    };
    instance.detach_notifier();

    #[cfg(feature = "tracing")]
    tracing::debug!(kind = kind.as_str(), name, "component detached");

    dispatcher.notify_with(kind.detached_event(), json!({ "name": name }));
    detached
}

fn deliver(target: &Weak<Mutex<ModuleInstance>>, notification: &Notification) -> Result<(), BoxError> {
    let Some(shared) = target.upgrade() else {
        return Ok(());
    };
    let mut instance = lock(&shared);
    if instance.responds_to(HANDLE_NOTIFICATION) {
        instance.invoke(
            HANDLE_NOTIFICATION,
            &[json!(notification.name()), notification.body().clone()],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::SubscriberId;
    use herald_std::{
        DeliveryQueue,
        module::Overrides,
        testing::RecordingHandler,
    };

    fn components() -> Components {
        Components::new(Dispatcher::new(DeliveryQueue::default()))
    }

    #[tokio::test]
    async fn test_duplicate_and_not_found() {
        let components = components();
        let def = ModuleDef::derive("users", None, Overrides::new()).unwrap();

        components
            .register(ComponentKind::Proxy, "users", &def, None, &[])
            .unwrap();
        let err = components
            .register(ComponentKind::Proxy, "users", &def, None, &[])
            .unwrap_err();
        assert_eq!(err.to_string(), "registry error: proxy `users` is already registered");

        // Same name under another kind is a different component.
        components
            .register(ComponentKind::Mediator, "users", &def, None, &[])
            .unwrap();
        assert_eq!(components.len(), 2);

        components.remove(ComponentKind::Proxy, "users").unwrap();
        let err = components.remove(ComponentKind::Proxy, "users").unwrap_err();
        assert!(matches!(
            err,
            HeraldError::Registry(RegistryError::NotFound { kind: "proxy", .. })
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_notifications() {
        let components = components();
        let events = RecordingHandler::new();
        for name in ["command:attached", "command:detached"] {
            components
                .dispatcher
                .register(name, events.clone(), SubscriberId::new());
        }
        let def = ModuleDef::derive("startup", None, Overrides::new()).unwrap();

        components
            .register(ComponentKind::Command, "startup", &def, None, &[])
            .unwrap();
        components.remove(ComponentKind::Command, "startup").unwrap();
        components.dispatcher.queue().drain().await;

        let received = events.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].name(), "command:attached");
        assert_eq!(received[0].body(), &json!({ "name": "startup" }));
        assert_eq!(received[1].name(), "command:detached");
    }
}
