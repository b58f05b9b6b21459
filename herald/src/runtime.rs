//! The runtime context object.
//!
//! A [`Runtime`] owns one delivery queue, one dispatcher, one module catalog
//! and one component cache. There is no process-wide instance: create as many
//! runtimes as you need and pass them around.

use crate::components::Components;
use herald_core::{
    ConfigError, Handler, HeraldError, ModuleError, Notification, Pacer, SubscriberId,
};
use herald_std::{
    DeliveryQueue, DeliveryStats, DispatchConfig, Dispatcher, Notifier, SubscriptionHandle,
    module::{ModuleCatalog, ModuleDef, ModuleInstance, Overrides},
    queue::FailureCallback,
};
use serde_json::Value;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

/// Notification dispatch plus module derivation, bundled.
///
/// Cloning is cheap; clones share everything.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::builder().max_sync(10).build()?;
/// runtime.register("tick", |n: &Notification| println!("{}", n.body()), SubscriberId::new());
/// runtime.notify("tick", json!({ "n": 1 }));
/// runtime.flush().await;
/// ```
#[derive(Clone)]
pub struct Runtime {
    dispatcher: Dispatcher,
    catalog: Arc<Mutex<ModuleCatalog>>,
    components: Components,
}

impl Runtime {
    /// A runtime with the default [`DispatchConfig`].
    pub fn new() -> Self {
        Self::from_queue(DeliveryQueue::default(), ModuleCatalog::new())
    }

    /// Start building a runtime.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    fn from_queue(queue: DeliveryQueue, catalog: ModuleCatalog) -> Self {
        let dispatcher = Dispatcher::new(queue);
        Self {
            components: Components::new(dispatcher.clone()),
            dispatcher,
            catalog: Arc::new(Mutex::new(catalog)),
        }
    }

    fn catalog(&self) -> MutexGuard<'_, ModuleCatalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time slicing settings in effect.
    pub fn config(&self) -> DispatchConfig {
        self.dispatcher.queue().config()
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Register `handler` for `event` under `subscriber`.
    pub fn register<H: Handler>(
        &self,
        event: impl Into<Arc<str>>,
        handler: H,
        subscriber: SubscriberId,
    ) -> SubscriptionHandle {
        self.dispatcher.register(event, handler, subscriber)
    }

    /// Remove every subscription of `subscriber` under `event`. Idempotent.
    pub fn remove(&self, event: &str, subscriber: SubscriberId) -> usize {
        self.dispatcher.remove(event, subscriber)
    }

    /// Remove exactly one subscription.
    pub fn remove_subscription(&self, handle: &SubscriptionHandle) -> bool {
        self.dispatcher.remove_subscription(handle)
    }

    /// Remove `subscriber` from every event.
    pub fn remove_subscriber(&self, subscriber: SubscriberId) -> usize {
        self.dispatcher.remove_subscriber(subscriber)
    }

    /// Returns `true` if `event` has at least one listener.
    pub fn has(&self, event: &str) -> bool {
        self.dispatcher.has(event)
    }

    /// Schedule `event` with `body` for every current listener.
    pub fn notify(&self, event: impl Into<Arc<str>>, body: Value) -> usize {
        self.dispatcher.notify_with(event, body)
    }

    /// Schedule an already built notification.
    pub fn send(&self, notification: Notification) -> usize {
        self.dispatcher.notify(notification)
    }

    /// The dispatcher behind this runtime.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// A type-erased notifier modules can publish through.
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::new(self.dispatcher.clone())
    }

    /// Wait until every queued delivery has run.
    pub async fn flush(&self) {
        self.dispatcher.queue().drain().await;
    }

    /// Delivery counters.
    pub fn stats(&self) -> DeliveryStats {
        self.dispatcher.queue().stats()
    }

    // ------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------

    /// Derive a module and add it to the catalog.
    pub fn derive_module(
        &self,
        qualified_name: &str,
        base: Option<&Arc<ModuleDef>>,
        overrides: Overrides,
    ) -> Result<Arc<ModuleDef>, ModuleError> {
        self.catalog().derive(qualified_name, base, overrides)
    }

    /// Derive a module from one already in the catalog.
    pub fn extend_module(
        &self,
        qualified_name: &str,
        base_name: &str,
        overrides: Overrides,
    ) -> Result<Arc<ModuleDef>, ModuleError> {
        self.catalog().extend(qualified_name, base_name, overrides)
    }

    /// Look up a module definition.
    pub fn module(&self, qualified_name: &str) -> Option<Arc<ModuleDef>> {
        self.catalog().get(qualified_name).cloned()
    }

    /// Declare a namespace ahead of its first module.
    pub fn declare_namespace(&self, namespace: &str) -> bool {
        self.catalog().declare_namespace(namespace)
    }

    /// Declared namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        self.catalog().namespaces().map(str::to_owned).collect()
    }

    /// Construct an instance of a catalogued module wired to this runtime.
    pub fn construct(
        &self,
        qualified_name: &str,
        config: Option<&Value>,
        args: &[Value],
    ) -> Result<ModuleInstance, HeraldError> {
        let def = self
            .module(qualified_name)
            .ok_or_else(|| ModuleError::UnknownModule(qualified_name.to_owned()))?;
        let mut instance = def.construct(config, args)?;
        instance.attach_notifier(self.notifier());
        Ok(instance)
    }

    /// The component cache.
    pub fn components(&self) -> &Components {
        &self.components
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Runtime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config: DispatchConfig,
    pacer: Option<Arc<dyn Pacer>>,
    on_failure: Option<FailureCallback>,
    namespaces: Vec<String>,
}

impl RuntimeBuilder {
    /// Replace the whole dispatch configuration.
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Deliveries per burst before yielding.
    pub fn max_sync(mut self, max_sync: usize) -> Self {
        self.config = self.config.with_max_sync(max_sync);
        self
    }

    /// Pause between bursts.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.config = self.config.with_delay(delay);
        self
    }

    /// Never yield.
    pub fn unbounded(mut self) -> Self {
        self.config = DispatchConfig {
            delay: self.config.delay,
            ..DispatchConfig::unbounded()
        };
        self
    }

    /// Replace the default Tokio pacer.
    pub fn pacer<P: Pacer>(mut self, pacer: P) -> Self {
        self.pacer = Some(Arc::new(pacer));
        self
    }

    /// Observe listener failures.
    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: Fn(&herald_core::DispatchError) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    /// Declare a module namespace up front.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.push(namespace.into());
        self
    }

    /// Validate the configuration and build the runtime.
    pub fn build(self) -> Result<Runtime, ConfigError> {
        let mut queue = DeliveryQueue::builder().config(self.config);
        if let Some(pacer) = self.pacer {
            queue = queue.shared_pacer(pacer);
        }
        if let Some(callback) = self.on_failure {
            queue = queue.shared_on_failure(callback);
        }

        let mut catalog = ModuleCatalog::new();
        for namespace in &self.namespaces {
            catalog.declare_namespace(namespace);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            max_sync = self.config.max_sync,
            delay_ms = u64::try_from(self.config.delay.as_millis()).unwrap_or(u64::MAX),
            "built runtime"
        );

        Ok(Runtime::from_queue(queue.build()?, catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_std::testing::{CountingHandler, RecordingPacer};
    use serde_json::json;

    #[test]
    fn test_builder_rejects_zero_max_sync() {
        assert_eq!(
            Runtime::builder().max_sync(0).build().err(),
            Some(ConfigError::InvalidMaxSync)
        );
    }

    #[test]
    fn test_builder_settings() {
        let runtime = Runtime::builder()
            .max_sync(3)
            .delay(Duration::from_millis(25))
            .namespace("app")
            .build()
            .unwrap();
        assert_eq!(runtime.config().max_sync, 3);
        assert_eq!(runtime.config().delay, Duration::from_millis(25));
        assert_eq!(runtime.namespaces(), vec!["app"]);

        let unbounded = Runtime::builder().unbounded().build().unwrap();
        assert!(unbounded.config().is_unbounded());
    }

    #[test]
    fn test_builder_logs_oversized_delay() {
        let subscriber = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .finish();
        let guard = tracing_subscriber::util::SubscriberInitExt::set_default(subscriber);
        let built = Runtime::builder().delay(Duration::MAX).build().unwrap();
        drop(guard);

        assert_eq!(built.config().delay, Duration::MAX);
        assert_eq!(
            serde_json::to_value(built.config()).unwrap()["delay_ms"],
            json!(u64::MAX)
        );
    }

    #[tokio::test]
    async fn test_register_notify_flush() {
        let pacer = RecordingPacer::new();
        let runtime = Runtime::builder().pacer(pacer.clone()).build().unwrap();
        let counter = CountingHandler::new();
        let id = SubscriberId::new();

        runtime.register("tick", counter.clone(), id);
        assert!(runtime.has("tick"));
        assert_eq!(runtime.notify("tick", json!(1)), 1);
        runtime.flush().await;
        assert_eq!(counter.count(), 1);

        runtime.remove("tick", id);
        assert!(!runtime.has("tick"));
        assert_eq!(runtime.notify("tick", json!(2)), 0);
        assert_eq!(runtime.stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_construct_wires_notifier() {
        let runtime = Runtime::new();
        let counter = CountingHandler::new();
        runtime.register("pinged", counter.clone(), SubscriberId::new());
        runtime
            .derive_module(
                "app.pinger",
                None,
                Overrides::new().method("ping", |call, _| Ok(json!(call.notify("pinged", json!(null))))),
            )
            .unwrap();

        let mut pinger = runtime.construct("app.pinger", None, &[]).unwrap();
        assert_eq!(pinger.invoke("ping", &[]).unwrap(), json!(1));
        runtime.flush().await;
        assert_eq!(counter.count(), 1);

        let err = runtime.construct("app.missing", None, &[]).unwrap_err();
        assert!(matches!(err, HeraldError::Module(ModuleError::UnknownModule(_))));
    }
}
