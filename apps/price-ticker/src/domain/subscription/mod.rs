//! Subscriber Registry
//!
//! Tracks which subscribers are currently registered for price pushes.
//!
//! # Design
//!
//! A subscriber is identified by an explicit [`SubscriberId`] allocated per
//! connection. Handles compare and hash by id only, so registering the same
//! connection twice never duplicates it.
//!
//! The registry is generic over the connection type it carries. The broker
//! instantiates it with `dyn SubscriberConnection`; the domain layer itself
//! never looks inside the connection.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

// =============================================================================
// Subscriber Identity
// =============================================================================

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Connection-scoped subscriber identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate a fresh, process-unique id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw id.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// =============================================================================
// Subscriber Handle
// =============================================================================

/// A subscriber id paired with the connection used to reach it.
pub struct SubscriberHandle<C: ?Sized> {
    id: SubscriberId,
    connection: Arc<C>,
}

impl<C: ?Sized> SubscriberHandle<C> {
    /// Create a handle.
    #[must_use]
    pub const fn new(id: SubscriberId, connection: Arc<C>) -> Self {
        Self { id, connection }
    }

    /// The handle's identity.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// The underlying connection.
    #[must_use]
    pub fn connection(&self) -> &C {
        &self.connection
    }
}

impl<C: ?Sized> Clone for SubscriberHandle<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            connection: Arc::clone(&self.connection),
        }
    }
}

impl<C: ?Sized> PartialEq for SubscriberHandle<C> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<C: ?Sized> Eq for SubscriberHandle<C> {}

impl<C: ?Sized> Hash for SubscriberHandle<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<C: ?Sized> fmt::Debug for SubscriberHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Subscriber Registry
// =============================================================================

/// Thread-safe set of registered subscriber handles.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use price_ticker::domain::subscription::{SubscriberHandle, SubscriberId, SubscriberRegistry};
///
/// let registry: SubscriberRegistry<str> = SubscriberRegistry::new();
/// let handle = SubscriberHandle::new(SubscriberId::from_raw(7), Arc::from("ws"));
///
/// assert!(registry.add(handle.clone()));
/// assert!(!registry.add(handle));          // idempotent
/// assert!(registry.remove(SubscriberId::from_raw(7)));
/// assert!(!registry.remove(SubscriberId::from_raw(7))); // already absent
/// ```
pub struct SubscriberRegistry<C: ?Sized> {
    handles: RwLock<BTreeMap<SubscriberId, SubscriberHandle<C>>>,
}

impl<C: ?Sized> Default for SubscriberRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> SubscriberRegistry<C> {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handles: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a handle.
    ///
    /// Returns `false` if a handle with the same id was already present;
    /// the existing registration is kept.
    pub fn add(&self, handle: SubscriberHandle<C>) -> bool {
        let mut handles = self.handles.write();
        if handles.contains_key(&handle.id) {
            return false;
        }
        handles.insert(handle.id, handle);
        true
    }

    /// Remove a handle if present.
    ///
    /// Returns `true` if the handle was registered.
    pub fn remove(&self, id: SubscriberId) -> bool {
        self.handles.write().remove(&id).is_some()
    }

    /// Whether `id` is currently registered.
    #[must_use]
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.handles.read().contains_key(&id)
    }

    /// Visit every registered handle.
    ///
    /// Iterates over a snapshot taken at call time, without holding the lock
    /// while `f` runs. A handle removed after the snapshot was taken is
    /// skipped; a handle added mid-iteration is not visited.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&SubscriberHandle<C>),
    {
        for handle in self.handles() {
            if self.contains(handle.id) {
                f(&handle);
            }
        }
    }

    /// Snapshot of all registered handles, ordered by id.
    #[must_use]
    pub fn handles(&self) -> Vec<SubscriberHandle<C>> {
        self.handles.read().values().cloned().collect()
    }

    /// Number of registered handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    /// Whether no handles are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn handle(raw: u64) -> SubscriberHandle<str> {
        SubscriberHandle::new(SubscriberId::from_raw(raw), Arc::from(format!("conn-{raw}")))
    }

    #[test]
    fn add_is_idempotent() {
        let registry = SubscriberRegistry::new();

        assert!(registry.add(handle(1)));
        assert!(!registry.add(handle(1)));

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_absent_is_noop() {
        let registry = SubscriberRegistry::new();
        registry.add(handle(1));

        assert!(!registry.remove(SubscriberId::from_raw(2)));

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(SubscriberId::from_raw(1)));
    }

    #[test]
    fn resubscribe_after_removal() {
        let registry = SubscriberRegistry::new();
        registry.add(handle(1));
        registry.remove(SubscriberId::from_raw(1));

        assert!(registry.add(handle(1)));
        assert!(registry.contains(SubscriberId::from_raw(1)));
    }

    #[test]
    fn handle_equality_ignores_connection() {
        let a = SubscriberHandle::<str>::new(SubscriberId::from_raw(5), Arc::from("first"));
        let b = SubscriberHandle::<str>::new(SubscriberId::from_raw(5), Arc::from("second"));
        assert_eq!(a, b);
    }

    #[test]
    fn for_each_visits_every_handle_once() {
        let registry = SubscriberRegistry::new();
        for raw in 1..=3 {
            registry.add(handle(raw));
        }

        let mut seen = vec![];
        registry.for_each(|h| seen.push(h.id().as_u64()));

        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn for_each_skips_handles_removed_mid_iteration() {
        let registry = SubscriberRegistry::new();
        for raw in 1..=3 {
            registry.add(handle(raw));
        }

        let mut seen = vec![];
        registry.for_each(|h| {
            seen.push(h.id().as_u64());
            if h.id().as_u64() == 1 {
                registry.remove(SubscriberId::from_raw(3));
                registry.add(handle(4));
            }
        });

        assert_eq!(seen, vec![1, 2]);
        assert!(registry.contains(SubscriberId::from_raw(4)));
    }

    #[test]
    fn subscriber_ids_are_unique() {
        let a = SubscriberId::next();
        let b = SubscriberId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn display_format() {
        assert_eq!(SubscriberId::from_raw(42).to_string(), "sub-42");
    }

    #[test]
    fn thread_safety_concurrent_add_remove() {
        let registry = Arc::new(SubscriberRegistry::<str>::new());
        let mut handles = vec![];

        for i in 0..10u64 {
            let r = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                r.add(handle(i));
                r.add(handle(i));
                if i % 2 == 0 {
                    r.remove(SubscriberId::from_raw(i));
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        // Odd ids remain
        assert_eq!(registry.len(), 5);
    }
}
