//! Named module definitions grouped by namespace.

use super::def::{ModuleDef, Overrides};
use herald_core::ModuleError;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

/// A catalog of module definitions keyed by qualified name.
///
/// Namespaces are explicit entries: they come into existence through
/// [`declare_namespace`](Self::declare_namespace) or with the first module
/// that names them, never as a side effect of a lookup.
#[derive(Debug, Default)]
pub struct ModuleCatalog {
    modules: BTreeMap<String, Arc<ModuleDef>>,
    namespaces: BTreeMap<String, BTreeSet<String>>,
}

impl ModuleCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a module and add it under `qualified_name`.
    pub fn derive(
        &mut self,
        qualified_name: &str,
        base: Option<&Arc<ModuleDef>>,
        overrides: Overrides,
    ) -> Result<Arc<ModuleDef>, ModuleError> {
        if self.modules.contains_key(qualified_name) {
            return Err(ModuleError::Duplicate(qualified_name.to_owned()));
        }
        let def = ModuleDef::derive(qualified_name, base, overrides)?;
        self.insert(Arc::clone(&def))?;
        Ok(def)
    }

    /// Derive a module from one already in the catalog.
    ///
    /// A missing base is reported as [`ModuleError::UnknownModule`].
    pub fn extend(
        &mut self,
        qualified_name: &str,
        base_name: &str,
        overrides: Overrides,
    ) -> Result<Arc<ModuleDef>, ModuleError> {
        let base = self
            .get(base_name)
            .cloned()
            .ok_or_else(|| ModuleError::UnknownModule(base_name.to_owned()))?;
        self.derive(qualified_name, Some(&base), overrides)
    }

    /// Add a definition derived elsewhere.
    pub fn insert(&mut self, def: Arc<ModuleDef>) -> Result<(), ModuleError> {
        let qualified = def.qualified_name().to_owned();
        if self.modules.contains_key(&qualified) {
            return Err(ModuleError::Duplicate(qualified));
        }
        if let Some(namespace) = def.namespace() {
            self.namespaces
                .entry(namespace.to_owned())
                .or_default()
                .insert(qualified.clone());
        }
        self.modules.insert(qualified, def);
        Ok(())
    }

    /// Declare an empty namespace. Returns `false` if it already existed.
    pub fn declare_namespace(&mut self, namespace: &str) -> bool {
        if self.namespaces.contains_key(namespace) {
            return false;
        }
        self.namespaces.insert(namespace.to_owned(), BTreeSet::new());
        true
    }

    /// Look up a definition.
    pub fn get(&self, qualified_name: &str) -> Option<&Arc<ModuleDef>> {
        self.modules.get(qualified_name)
    }

    /// Returns `true` if `qualified_name` is defined.
    pub fn contains(&self, qualified_name: &str) -> bool {
        self.modules.contains_key(qualified_name)
    }

    /// Declared namespaces, sorted.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    /// Returns `true` if `namespace` exists.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Definitions inside `namespace`.
    pub fn in_namespace<'a>(&'a self, namespace: &str) -> impl Iterator<Item = &'a Arc<ModuleDef>> + 'a {
        self.namespaces
            .get(namespace)
            .into_iter()
            .flatten()
            .filter_map(|qualified| self.modules.get(qualified))
    }

    /// Remove a definition. Its namespace stays declared.
    ///
    /// Modules derived from it keep their own reference to it.
    pub fn remove(&mut self, qualified_name: &str) -> Option<Arc<ModuleDef>> {
        let def = self.modules.remove(qualified_name)?;
        if let Some(members) = def.namespace().and_then(|ns| self.namespaces.get_mut(ns)) {
            members.remove(qualified_name);
        }
        Some(def)
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if no module is defined.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
