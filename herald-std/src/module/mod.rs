//! Module derivation.
//!
//! A [`ModuleDef`] is built from an optional base definition plus
//! [`Overrides`]. Every overriding entry in the behavior table keeps a
//! reference to the entry it replaced, and [`Call::invoke_base`] follows that
//! reference. Resolution is fixed at derivation time; nothing inspects the
//! call stack.
//!
//! ```rust,ignore
//! let base = ModuleDef::derive("audio.player", None, Overrides::new()
//!     .method("describe", |_, _| Ok(json!("player"))))?;
//! let loud = ModuleDef::derive("audio.loud", Some(&base), Overrides::new()
//!     .method("describe", |call, args| {
//!         let inner = call.invoke_base(args)?;
//!         Ok(json!(format!("loud {}", inner.as_str().unwrap_or_default())))
//!     }))?;
//! assert_eq!(loud.instantiate().invoke("describe", &[])?, json!("loud player"));
//! ```

mod call;
mod catalog;
mod def;
pub mod merge;

pub use call::{Call, ModuleInstance};
pub use catalog::ModuleCatalog;
pub use def::{CONSTRUCTOR, INITIALIZE, Method, MethodEntry, ModuleDef, Overrides, method};
