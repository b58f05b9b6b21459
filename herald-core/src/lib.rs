//! # herald-core
//!
//! Core types for the Herald notification framework.
//!
//! This crate has minimal dependencies and is meant to be imported by modules
//! and extensions that only need to speak the vocabulary, not run a
//! dispatcher.
//!
//! # Vocabulary
//!
//! - [`Notification`] - a named event plus a shared payload
//! - [`Handler`] - the listener callable bound to an event name
//! - [`SubscriberId`] - the removal key a subscription is registered under
//! - [`Pacer`] - the yield performed between two delivery bursts
//! - [`Message`] - marker for payload types
//!
//! # Error Types
//!
//! - [`HeraldError`] - Top-level error type
//! - [`DispatchError`] - Listener failures contained by the dispatcher
//! - [`ModuleError`] - Module derivation errors
//! - [`RegistryError`] - Named component errors

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod error;
mod handler;
mod message;
mod notification;
mod outcome;
mod pacer;
mod subscriber;

// Re-exports
pub use error::{BoxError, ConfigError, DispatchError, HeraldError, ModuleError, RegistryError};
pub use handler::{Handler, SharedHandler};
pub use message::Message;
pub use notification::Notification;
pub use outcome::IntoOutcome;
pub use pacer::Pacer;
pub use subscriber::SubscriberId;
