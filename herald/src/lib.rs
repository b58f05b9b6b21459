//! # herald - In-Process Notifications and Module Derivation
//!
//! `herald` delivers named notifications to registered listeners through a
//! cooperative, time-sliced queue, and builds modules by deriving them from a
//! base definition plus overrides.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//! use serde_json::json;
//!
//! let runtime = Runtime::builder().max_sync(5).build()?;
//! runtime.register("tick", |n: &Notification| println!("tick {}", n.body()), SubscriberId::new());
//! runtime.notify("tick", json!({ "n": 1 }));
//! runtime.flush().await;
//! ```
//!
//! ## Delivery
//!
//! `notify` never runs a listener. It snapshots the listeners registered at
//! that moment and appends one task per listener to the delivery queue. The
//! queue runs up to `max_sync` tasks back to back, then yields for `delay`
//! before continuing. Listener errors and panics are contained and reported
//! through the failure callback.
//!
//! ## Modules
//!
//! ```rust,ignore
//! let base = runtime.derive_module("audio.player", None, Overrides::new()
//!     .defaults(json!({ "volume": 5 }))
//!     .method("play", |_, _| Ok(json!("playing"))))?;
//! let loud = runtime.derive_module("audio.loud", Some(&base), Overrides::new()
//!     .method("play", |call, args| {
//!         let inner = call.invoke_base(args)?;
//!         Ok(json!(format!("LOUD {}", inner.as_str().unwrap_or_default())))
//!     }))?;
//! ```

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub mod components;
mod runtime;

pub use herald_core::{
    // Error types
    BoxError,
    ConfigError,
    DispatchError,
    // Handler
    Handler,
    HeraldError,
    IntoOutcome,
    // Message
    Message,
    ModuleError,
    Notification,
    // Pacing
    Pacer,
    RegistryError,
    SharedHandler,
    SubscriberId,
};

pub use herald_std::{
    DeliveryQueue, DeliveryQueueBuilder, DeliveryStats, DispatchConfig, Dispatcher,
    ListenerRegistry, Notifier, SubscriptionHandle, TokioPacer,
};

pub use components::{ComponentKind, Components, SharedInstance};
pub use runtime::{Runtime, RuntimeBuilder};

/// Module derivation.
pub mod module {
    pub use herald_std::module::{
        CONSTRUCTOR, Call, INITIALIZE, Method, MethodEntry, ModuleCatalog, ModuleDef,
        ModuleInstance, Overrides, merge, method,
    };
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use herald_std::testing::*;
}

/// Prelude module - common imports for Herald.
///
/// # Usage
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BoxError,
        ComponentKind,
        Handler,
        HeraldError,
        Message,
        ModuleError,
        Notification,
        Runtime,
        SubscriberId,
        module::{Call, ModuleDef, ModuleInstance, Overrides},
    };
}

#[cfg(feature = "macros")]
pub use herald_macros::Message;
