//! # Subscriber Registry
//!
//! Ordered set of listeners for one kind of notification. Delivery itself
//! happens in the engine, outside its state lock, from a [`snapshot`].
//!
//! [`snapshot`]: SubscriberRegistry::snapshot

use std::sync::Arc;

/// Shared listener callback.
pub type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Handle identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Listeners in registration order.
pub struct SubscriberRegistry<A> {
    next_id: u64,
    entries: Vec<(SubscriberId, Callback<A>)>,
}

impl<A> SubscriberRegistry<A> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Register a listener at the end of the delivery order.
    pub fn insert(&mut self, callback: Callback<A>) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    /// Remove a listener. Unknown or already-removed ids are ignored.
    pub fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Current listeners, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Callback<A>> {
        self.entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A> Default for SubscriberRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_snapshot_preserves_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SubscriberRegistry::<u32>::new();

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            registry.insert(Arc::new(move |value: &u32| seen.lock().push((tag, *value))));
        }

        for callback in registry.snapshot() {
            callback(&7);
        }

        assert_eq!(
            *seen.lock(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = SubscriberRegistry::<u32>::new();
        let id = registry.insert(Arc::new(|_| {}));
        let other = registry.insert(Arc::new(|_| {}));

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(other));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut registry = SubscriberRegistry::<u32>::new();
        let first = registry.insert(Arc::new(|_| {}));
        registry.remove(first);
        let second = registry.insert(Arc::new(|_| {}));

        assert_ne!(first, second);
    }

    #[test]
    fn test_clear() {
        let mut registry = SubscriberRegistry::<u32>::new();
        registry.insert(Arc::new(|_| {}));
        registry.insert(Arc::new(|_| {}));
        registry.clear();

        assert!(registry.snapshot().is_empty());
    }
}
