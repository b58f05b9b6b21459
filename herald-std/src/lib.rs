//! # herald-std
//!
//! Standard implementations for the Herald notification framework.
//!
//! This crate provides:
//! - **Listener registry**: [`ListenerRegistry`]
//! - **Delivery queue**: [`DeliveryQueue`], paced by [`TokioPacer`]
//! - **Dispatch**: [`Dispatcher`] and the [`Notifier`] seam modules publish through
//! - **Module derivation**: [`module::ModuleDef`], [`module::ModuleCatalog`]
//! - **Testing helpers**: [`testing`]

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use herald_core;

// Modules
pub mod config;
pub mod dispatch;
pub mod module;
pub mod queue;
pub mod registry;
pub mod testing;

pub use config::DispatchConfig;
pub use dispatch::{Dispatcher, Notifier};
pub use queue::{DeliveryQueue, DeliveryQueueBuilder, DeliveryStats, DeliveryTask, TokioPacer};
pub use registry::{ListenerRegistry, Subscription, SubscriptionHandle};
