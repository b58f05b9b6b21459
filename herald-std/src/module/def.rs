//! Module definitions and derivation.

use super::{
    call::{Call, ModuleInstance},
    merge::deep_merge,
};
use herald_core::ModuleError;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt, sync::Arc};

/// Reserved member name. Construction belongs to [`ModuleDef::construct`].
pub const CONSTRUCTOR: &str = "constructor";

/// Method run by [`ModuleDef::construct`] when the table defines it.
pub const INITIALIZE: &str = "initialize";

/// A method body.
///
/// Receives the executing [`Call`] frame and positional arguments.
pub type Method =
    Arc<dyn Fn(&mut Call<'_>, &[Value]) -> Result<Value, ModuleError> + Send + Sync + 'static>;

/// Wrap a closure as a [`Method`].
pub fn method<F>(body: F) -> Method
where
    F: Fn(&mut Call<'_>, &[Value]) -> Result<Value, ModuleError> + Send + Sync + 'static,
{
    Arc::new(body)
}

/// One entry of a behavior table.
///
/// `base` points at the entry this one replaced when it was derived, so an
/// override can reach the implementation it shadows without any lookup.
pub struct MethodEntry {
    name: Arc<str>,
    owner: Arc<str>,
    body: Method,
    base: Option<Arc<MethodEntry>>,
}

impl MethodEntry {
    /// Method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualified name of the module that supplied this body.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The entry this one overrides.
    pub fn base(&self) -> Option<&Arc<MethodEntry>> {
        self.base.as_ref()
    }

    pub(crate) fn body(&self) -> &Method {
        &self.body
    }

    fn is_same_body(&self, other: &Method) -> bool {
        Arc::ptr_eq(&self.body, other)
    }
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("base", &self.base.as_ref().map(|base| base.owner()))
            .finish_non_exhaustive()
    }
}

/// What a derived module changes relative to its base.
///
/// # Example
///
/// ```rust,ignore
/// let overrides = Overrides::new()
///     .defaults(json!({ "volume": 3 }))
///     .method("play", |call, args| {
///         let inner = call.invoke_base(args)?;
///         Ok(json!(format!("loud {inner}")))
///     });
/// ```
#[derive(Clone, Default)]
pub struct Overrides {
    defaults: Option<Value>,
    methods: BTreeMap<String, Method>,
}

impl Overrides {
    /// Empty overrides: the derived module behaves exactly like its base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Config defaults deep-merged over the base defaults.
    pub fn defaults(mut self, defaults: Value) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Add or replace a method.
    pub fn method<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Call<'_>, &[Value]) -> Result<Value, ModuleError> + Send + Sync + 'static,
    {
        self.shared_method(name, method(body))
    }

    /// Add a method body that may already be used elsewhere.
    ///
    /// Passing the exact body the base uses keeps the inherited entry.
    pub fn shared_method(mut self, name: impl Into<String>, body: Method) -> Self {
        self.methods.insert(name.into(), body);
        self
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overrides")
            .field("defaults", &self.defaults)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An immutable module definition.
pub struct ModuleDef {
    name: Arc<str>,
    namespace: Option<Arc<str>>,
    qualified: Arc<str>,
    base: Option<Arc<ModuleDef>>,
    defaults: Value,
    methods: BTreeMap<Arc<str>, Arc<MethodEntry>>,
}

impl ModuleDef {
    /// Derive a definition from `base` (or from nothing) plus `overrides`.
    ///
    /// `qualified_name` is `name` or `namespace.name`.
    pub fn derive(
        qualified_name: &str,
        base: Option<&Arc<ModuleDef>>,
        overrides: Overrides,
    ) -> Result<Arc<ModuleDef>, ModuleError> {
        let (namespace, name) = split_name(qualified_name)?;
        let qualified: Arc<str> = Arc::from(qualified_name);

        let mut defaults = base
            .map(|base| base.defaults.clone())
            .unwrap_or_else(|| Value::Object(Map::new()));
        if let Some(overlay) = &overrides.defaults {
            deep_merge(&mut defaults, overlay);
        }

        let mut methods = base.map(|base| base.methods.clone()).unwrap_or_default();
        for (method_name, body) in overrides.methods {
            if method_name == CONSTRUCTOR {
                return Err(ModuleError::ReservedName(method_name));
            }
            let replaced = match methods.get(method_name.as_str()) {
                Some(existing) if existing.is_same_body(&body) => continue,
                Some(existing) => Some(Arc::clone(existing)),
                None => None,
            };
            let method_name: Arc<str> = Arc::from(method_name);
            let entry = MethodEntry {
                name: Arc::clone(&method_name),
                owner: Arc::clone(&qualified),
                body,
                base: replaced,
            };
            methods.insert(method_name, Arc::new(entry));
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            module = qualified_name,
            base = base.map(|base| base.qualified_name()),
            methods = methods.len(),
            "derived module"
        );

        Ok(Arc::new(ModuleDef {
            name: Arc::from(name),
            namespace: namespace.map(Arc::from),
            qualified,
            base: base.cloned(),
            defaults,
            methods,
        }))
    }

    /// Short name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace, if the qualified name had one.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// `namespace.name` or `name`.
    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }

    /// The definition this one was derived from.
    pub fn base(&self) -> Option<&Arc<ModuleDef>> {
        self.base.as_ref()
    }

    /// Config defaults after merging the whole base chain.
    pub fn defaults(&self) -> &Value {
        &self.defaults
    }

    /// Most-derived entry for `name`.
    pub fn method(&self, name: &str) -> Option<&Arc<MethodEntry>> {
        self.methods.get(name)
    }

    /// Returns `true` if the behavior table has `name`.
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Method names in the behavior table, sorted.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(|name| &**name)
    }

    /// Returns `true` if `self` is `other` or derives from it.
    pub fn is_a(&self, other: &ModuleDef) -> bool {
        let mut current = Some(self);
        while let Some(def) = current {
            if std::ptr::eq(def, other) {
                return true;
            }
            current = def.base.as_deref();
        }
        false
    }

    /// Create an instance without running `initialize`.
    pub fn instantiate(self: &Arc<Self>) -> ModuleInstance {
        ModuleInstance::new(Arc::clone(self))
    }

    /// Create an instance, merge `config` over the defaults and run
    /// `initialize` with `args` if the table defines it.
    pub fn construct(
        self: &Arc<Self>,
        config: Option<&Value>,
        args: &[Value],
    ) -> Result<ModuleInstance, ModuleError> {
        let mut instance = self.instantiate();
        if let Some(config) = config {
            deep_merge(instance.config_mut(), config);
        }
        if self.has_method(INITIALIZE) {
            instance.invoke(INITIALIZE, args)?;
        }
        instance.mark_initialized();
        Ok(instance)
    }
}

impl fmt::Debug for ModuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDef")
            .field("qualified", &self.qualified)
            .field("base", &self.base.as_ref().map(|base| base.qualified_name()))
            .field("defaults", &self.defaults)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn split_name(qualified: &str) -> Result<(Option<&str>, &str), ModuleError> {
    let invalid = || ModuleError::InvalidName(qualified.to_owned());
    let mut segments = qualified.split('.');
    let (first, second) = (segments.next(), segments.next());
    if segments.next().is_some() {
        return Err(invalid());
    }
    match (first, second) {
        (Some(name), None) if !name.is_empty() => Ok((None, name)),
        (Some(namespace), Some(name)) if !namespace.is_empty() && !name.is_empty() => {
            Ok((Some(namespace), name))
        }
        _ => Err(invalid()),
    }
}
