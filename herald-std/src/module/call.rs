//! Module instances and method call frames.

use super::def::{MethodEntry, ModuleDef};
use crate::dispatch::Notifier;
use herald_core::{ModuleError, Notification, SubscriberId};
use serde_json::{Map, Value};
use std::{fmt, sync::Arc};

/// A live module: a definition plus its own configuration and state.
pub struct ModuleInstance {
    def: Arc<ModuleDef>,
    id: SubscriberId,
    config: Value,
    state: Map<String, Value>,
    initialized: bool,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ModuleInstance {
    pub(crate) fn new(def: Arc<ModuleDef>) -> Self {
        Self {
            config: def.defaults().clone(),
            def,
            id: SubscriberId::new(),
            state: Map::new(),
            initialized: false,
            notifier: None,
        }
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// The instance's definition.
    pub fn def(&self) -> &Arc<ModuleDef> {
        &self.def
    }

    /// Id the instance subscribes under.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Call the most-derived `name` with `args`.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Value, ModuleError> {
        let entry = self
            .def
            .method(name)
            .cloned()
            .ok_or_else(|| ModuleError::UnknownMethod {
                module: self.def.qualified_name().to_owned(),
                method: name.to_owned(),
            })?;
        Call::enter(self, entry, args)
    }

    /// Returns `true` if the definition has `name`.
    pub fn responds_to(&self, name: &str) -> bool {
        self.def.has_method(name)
    }

    /// Returns `true` if the instance's definition is `def` or derives from it.
    pub fn is_a(&self, def: &ModuleDef) -> bool {
        self.def.is_a(def)
    }

    /// Returns `true` once `construct` has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Effective configuration.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Mutable configuration. Changes stay local to this instance.
    pub fn config_mut(&mut self) -> &mut Value {
        &mut self.config
    }

    /// Read a state slot.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Write a state slot, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.state.insert(key.into(), value)
    }

    /// Whole state map.
    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    /// Attach the notifier used by [`notify`](Self::notify).
    pub fn attach_notifier(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifier = Some(notifier);
    }

    /// Drop the notifier.
    pub fn detach_notifier(&mut self) -> Option<Arc<dyn Notifier>> {
        self.notifier.take()
    }

    /// Publish a notification. Returns `0` when no notifier is attached.
    pub fn notify(&self, name: &str, body: Value) -> usize {
        match &self.notifier {
            Some(notifier) => notifier.send(Notification::new(name, body)),
            None => 0,
        }
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("module", &self.def.qualified_name())
            .field("id", &self.id)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

/// The frame of one executing method.
///
/// Holds the receiver and the entry being run; [`invoke_base`] follows that
/// entry's back-reference, so nested calls to it walk up the override chain
/// one step at a time.
///
/// [`invoke_base`]: Call::invoke_base
pub struct Call<'a> {
    receiver: &'a mut ModuleInstance,
    frame: Arc<MethodEntry>,
}

impl<'a> Call<'a> {
    pub(crate) fn enter(
        receiver: &mut ModuleInstance,
        frame: Arc<MethodEntry>,
        args: &[Value],
    ) -> Result<Value, ModuleError> {
        let body = Arc::clone(frame.body());
        let mut call = Call { receiver, frame };
        body(&mut call, args)
    }

    /// Run the implementation the executing method overrides.
    pub fn invoke_base(&mut self, args: &[Value]) -> Result<Value, ModuleError> {
        let base = self
            .frame
            .base()
            .cloned()
            .ok_or_else(|| ModuleError::NoSuperImplementation {
                module: self.frame.owner().to_owned(),
                method: self.frame.name().to_owned(),
            })?;
        Call::enter(&mut *self.receiver, base, args)
    }

    /// Returns `true` if the executing method overrides something.
    pub fn has_base(&self) -> bool {
        self.frame.base().is_some()
    }

    /// Call the receiver's most-derived `name`.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Value, ModuleError> {
        self.receiver.invoke(name, args)
    }

    /// Name of the executing method.
    pub fn method_name(&self) -> &str {
        self.frame.name()
    }

    /// Module that supplied the executing body.
    pub fn owner(&self) -> &str {
        self.frame.owner()
    }

    /// The receiver.
    pub fn receiver(&self) -> &ModuleInstance {
        &*self.receiver
    }

    /// The receiver, mutably.
    pub fn receiver_mut(&mut self) -> &mut ModuleInstance {
        &mut *self.receiver
    }

    /// Receiver configuration.
    pub fn config(&self) -> &Value {
        self.receiver.config()
    }

    /// Receiver configuration, mutably.
    pub fn config_mut(&mut self) -> &mut Value {
        self.receiver.config_mut()
    }

    /// Read a receiver state slot.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.receiver.get(key)
    }

    /// Write a receiver state slot.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.receiver.set(key, value)
    }

    /// Publish through the receiver's notifier.
    pub fn notify(&self, name: &str, body: Value) -> usize {
        self.receiver.notify(name, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Overrides, method};
    use serde_json::json;

    fn append(call: &mut Call<'_>, args: &[Value], tag: &str) -> Result<Value, ModuleError> {
        let inner = call.invoke_base(args)?;
        Ok(json!(format!("{tag}({})", inner.as_str().unwrap_or_default())))
    }

    #[test]
    fn test_override_chain_a_b_c() {
        let a = ModuleDef::derive("A", None, Overrides::new().method("f", |_, _| Ok(json!("A")))).unwrap();
        let b = ModuleDef::derive("B", Some(&a), Overrides::new().method("f", |call, args| append(call, args, "B")))
            .unwrap();
        let c = ModuleDef::derive("C", Some(&b), Overrides::new().method("f", |call, args| append(call, args, "C")))
            .unwrap();

        assert_eq!(c.instantiate().invoke("f", &[]).unwrap(), json!("C(B(A))"));
        assert_eq!(b.instantiate().invoke("f", &[]).unwrap(), json!("B(A)"));
        assert_eq!(a.instantiate().invoke("f", &[]).unwrap(), json!("A"));
    }

    #[test]
    fn test_inherited_override_keeps_its_base() {
        let a = ModuleDef::derive("A", None, Overrides::new().method("f", |_, _| Ok(json!("A")))).unwrap();
        let b = ModuleDef::derive("B", Some(&a), Overrides::new().method("f", |call, args| append(call, args, "B")))
            .unwrap();
        let c = ModuleDef::derive("C", Some(&b), Overrides::new()).unwrap();

        assert_eq!(c.instantiate().invoke("f", &[]).unwrap(), json!("B(A)"));
    }

    #[test]
    fn test_no_base_implementation() {
        let a = ModuleDef::derive("ns.A", None, Overrides::new().method("f", |call, args| call.invoke_base(args)))
            .unwrap();
        let err = a.instantiate().invoke("f", &[]).unwrap_err();
        assert!(matches!(
            err,
            ModuleError::NoSuperImplementation { ref module, ref method } if module == "ns.A" && method == "f"
        ));
        assert_eq!(err.to_string(), "`ns.A.f` has no base implementation");
    }

    #[test]
    fn test_base_runs_against_derived_receiver() {
        let a = ModuleDef::derive(
            "A",
            None,
            Overrides::new()
                .method("name", |_, _| Ok(json!("a")))
                .method("greet", |call, _| {
                    let name = call.invoke("name", &[])?;
                    Ok(json!(format!("hello {}", name.as_str().unwrap_or_default())))
                }),
        )
        .unwrap();
        let b = ModuleDef::derive(
            "B",
            Some(&a),
            Overrides::new()
                .method("name", |_, _| Ok(json!("b")))
                .method("greet", |call, args| {
                    call.set("greeted", json!(true));
                    call.invoke_base(args)
                }),
        )
        .unwrap();

        let mut instance = b.instantiate();
        assert_eq!(instance.invoke("greet", &[]).unwrap(), json!("hello b"));
        assert_eq!(instance.get("greeted"), Some(&json!(true)));
    }

    #[test]
    fn test_unknown_method() {
        let a = ModuleDef::derive("A", None, Overrides::new()).unwrap();
        let err = a.instantiate().invoke("missing", &[]).unwrap_err();
        assert!(matches!(err, ModuleError::UnknownMethod { ref method, .. } if method == "missing"));
    }

    #[test]
    fn test_method_errors_propagate() {
        let a = ModuleDef::derive("A", None, Overrides::new().method("f", |_, _| Err(ModuleError::Method("boom".into())))).unwrap();
        let err = a.instantiate().invoke("f", &[]).unwrap_err();
        assert!(matches!(err, ModuleError::Method(_)));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_config_isolated_per_instance() {
        let a = ModuleDef::derive("A", None, Overrides::new().defaults(json!({ "level": "a", "nested": { "x": 1 } })))
            .unwrap();
        let b = ModuleDef::derive("B", Some(&a), Overrides::new().defaults(json!({ "level": "b" }))).unwrap();
        let c = ModuleDef::derive("C", Some(&b), Overrides::new().defaults(json!({ "nested": { "y": 2 } })))
            .unwrap();

        let mut first = c.construct(Some(&json!({ "nested": { "x": 9 } })), &[]).unwrap();
        let second = c.construct(None, &[]).unwrap();
        first.config_mut()["level"] = json!("mutated");

        assert_eq!(first.config(), &json!({ "level": "mutated", "nested": { "x": 9, "y": 2 } }));
        assert_eq!(second.config(), &json!({ "level": "b", "nested": { "x": 1, "y": 2 } }));
        assert_eq!(c.defaults(), &json!({ "level": "b", "nested": { "x": 1, "y": 2 } }));
        assert_eq!(a.defaults(), &json!({ "level": "a", "nested": { "x": 1 } }));
    }

    #[test]
    fn test_shared_body_under_new_name() {
        let body = method(|call, _| Ok(json!(call.method_name())));
        let a = ModuleDef::derive("A", None, Overrides::new().shared_method("f", body.clone())).unwrap();
        let b = ModuleDef::derive("B", Some(&a), Overrides::new().shared_method("g", body)).unwrap();

        let mut instance = b.instantiate();
        assert_eq!(instance.invoke("f", &[]).unwrap(), json!("f"));
        assert_eq!(instance.invoke("g", &[]).unwrap(), json!("g"));
        assert!(instance.is_a(&a));
    }

    #[test]
    fn test_notify_without_notifier() {
        let a = ModuleDef::derive("A", None, Overrides::new().method("f", |call, _| Ok(json!(call.notify("x", json!(1))))))
            .unwrap();
        assert_eq!(a.instantiate().invoke("f", &[]).unwrap(), json!(0));
    }
}
