//! Subscriber identity used as a removal key.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a subscriber.
///
/// A `SubscriberId` is a removal key, not a subscription id: any number of
/// subscriptions may be registered under the same identity, and removing the
/// identity from an event removes all of them.
///
/// Two ids compare equal when they were minted by the same call to
/// [`SubscriberId::new`], or when both were taken with [`SubscriberId::of`]
/// from the same allocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Repr);

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Repr {
    Minted(u64),
    Address(usize),
}

impl SubscriberId {
    /// Mint a fresh, process-unique identity.
    pub fn new() -> Self {
        Self(Repr::Minted(NEXT_ID.fetch_add(1, Ordering::Relaxed)))
    }

    /// Identity of the value behind an `Arc`.
    ///
    /// Every clone of the same `Arc` yields the same id. The address may be
    /// reused once the last clone is dropped, so keep the `Arc` alive for as
    /// long as its subscriptions are registered.
    pub fn of<T: ?Sized>(value: &Arc<T>) -> Self {
        Self(Repr::Address(Arc::as_ptr(value) as *const () as usize))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({self})")
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Minted(id) => write!(f, "#{id}"),
            Repr::Address(addr) => write!(f, "@{addr:#x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_ids_are_distinct() {
        let a = SubscriberId::new();
        let b = SubscriberId::new();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_arc_identity() {
        let owner = Arc::new(String::from("mediator"));
        let other = Arc::new(String::from("mediator"));

        assert_eq!(SubscriberId::of(&owner), SubscriberId::of(&owner.clone()));
        assert_ne!(SubscriberId::of(&owner), SubscriberId::of(&other));
    }

    #[test]
    fn test_display() {
        let owner = Arc::new(1u8);
        assert!(SubscriberId::of(&owner).to_string().starts_with("@0x"));
        assert!(SubscriberId::new().to_string().starts_with('#'));
    }
}
