//! Message trait for notification bodies.

/// A marker trait for notification bodies.
///
/// Bodies must be `Send + Sync + 'static` because a single body is shared by
/// reference with every listener of a notification, possibly across threads.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone)]
/// struct Tick { n: u64 }
///
/// impl Message for Tick {}
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a valid Message",
    label = "must be `Send + Sync + 'static`",
    note = "Notification bodies in Herald must be thread-safe and static."
)]
pub trait Message: Send + Sync + 'static {}

// Common Message implementations
impl Message for () {}
impl Message for bool {}
impl Message for i64 {}
impl Message for u64 {}
impl Message for f64 {}
impl Message for String {}
impl Message for &'static str {}
impl Message for serde_json::Value {}
impl<T: Message> Message for Box<T> {}
impl<T: Message> Message for std::sync::Arc<T> {}
impl<T: Message> Message for Vec<T> {}
impl<T: Message> Message for Option<T> {}
impl<T: Message, E: Message> Message for Result<T, E> {}
