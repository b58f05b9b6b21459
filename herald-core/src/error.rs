//! Error types for Herald.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`HeraldError`] - Top-level error type for all Herald operations
//! - [`DispatchError`] - Listener failures contained by the dispatcher
//! - [`ModuleError`] - Module derivation and invocation errors
//! - [`RegistryError`] - Named component registration errors
//! - [`ConfigError`] - Invalid dispatcher configuration

use crate::subscriber::SubscriberId;
use std::sync::Arc;
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all Herald operations.
#[derive(Error, Debug)]
pub enum HeraldError {
    /// A listener failed during delivery.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A module could not be derived or invoked.
    #[error("module error: {0}")]
    Module(#[from] ModuleError),

    /// A named component was misused.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The configuration was rejected.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// Listener failures caught while draining the delivery queue.
///
/// These never reach the caller of `notify`; the dispatcher logs them, counts
/// them and hands them to the configured failure callback.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The handler returned an error.
    #[error("listener {subscriber} failed on `{event}`")]
    MisbehavingListener {
        /// Event being delivered.
        event: Arc<str>,
        /// Identity the failing subscription was registered under.
        subscriber: SubscriberId,
        /// The handler's error.
        #[source]
        source: BoxError,
    },

    /// The handler panicked.
    #[error("listener {subscriber} panicked on `{event}`: {message}")]
    ListenerPanicked {
        /// Event being delivered.
        event: Arc<str>,
        /// Identity the failing subscription was registered under.
        subscriber: SubscriberId,
        /// Panic payload, when it was a string.
        message: String,
    },
}

impl DispatchError {
    /// Event name of the failed delivery.
    pub fn event(&self) -> &str {
        match self {
            DispatchError::MisbehavingListener { event, .. }
            | DispatchError::ListenerPanicked { event, .. } => event,
        }
    }

    /// Subscriber of the failed delivery.
    pub fn subscriber(&self) -> SubscriberId {
        match self {
            DispatchError::MisbehavingListener { subscriber, .. }
            | DispatchError::ListenerPanicked { subscriber, .. } => *subscriber,
        }
    }
}

/// Errors raised by module derivation and method invocation.
#[derive(Error, Debug)]
pub enum ModuleError {
    /// `invoke_base` was called from a method that overrides nothing.
    #[error("`{module}.{method}` has no base implementation")]
    NoSuperImplementation {
        /// Qualified name of the module owning the executing method.
        module: String,
        /// Name of the executing method.
        method: String,
    },

    /// The receiver's definition has no method with that name.
    #[error("module `{module}` has no method `{method}`")]
    UnknownMethod {
        /// Qualified name of the receiver's module.
        module: String,
        /// Requested method.
        method: String,
    },

    /// The qualified name is not `name` or `namespace.name`.
    #[error("invalid module name `{0}`: expected `name` or `namespace.name`")]
    InvalidName(String),

    /// An override table used a structural member name.
    #[error("`{0}` is a reserved member name")]
    ReservedName(String),

    /// A module with this qualified name is already defined.
    #[error("module `{0}` is already defined")]
    Duplicate(String),

    /// A method returned a value of the wrong shape.
    #[error("`{module}.{method}` must return {expected}")]
    UnexpectedReturn {
        /// Qualified name of the receiver's module.
        module: String,
        /// Method that returned the value.
        method: String,
        /// Description of the accepted shape.
        expected: &'static str,
    },

    /// No module is defined under this qualified name.
    #[error("module `{0}` is not defined")]
    UnknownModule(String),

    /// A method body failed.
    #[error(transparent)]
    Method(BoxError),
}

/// Errors raised by named component registries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The name is already in use; remove the existing entry first.
    #[error("{kind} `{name}` is already registered")]
    DuplicateRegistration {
        /// Component flavor.
        kind: &'static str,
        /// Requested name.
        name: String,
    },

    /// Nothing is registered under the name.
    #[error("{kind} `{name}` is not registered")]
    NotFound {
        /// Component flavor.
        kind: &'static str,
        /// Requested name.
        name: String,
    },
}

/// Errors raised while validating configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_sync` must allow at least one delivery per burst.
    #[error("max_sync must be at least 1")]
    InvalidMaxSync,
}

// Convenience conversions
impl From<BoxError> for HeraldError {
    fn from(err: BoxError) -> Self {
        HeraldError::Custom(err)
    }
}

impl From<BoxError> for ModuleError {
    fn from(err: BoxError) -> Self {
        ModuleError::Method(err)
    }
}
