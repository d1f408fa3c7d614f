//! Subscription registry: the intents that must be active on the server.
//!
//! Mutations are atomic per call; the set is replayed in sorted order after
//! every reconnection.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use fieldlink_core::EntityKey;

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    active: Mutex<BTreeSet<EntityKey>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the key was not yet active.
    pub fn insert(&self, key: EntityKey) -> bool {
        self.guard().insert(key)
    }

    /// Returns `true` if the key was active.
    pub fn remove(&self, key: &EntityKey) -> bool {
        self.guard().remove(key)
    }

    /// Stable (sorted) copy of the active set.
    pub fn snapshot(&self) -> Vec<EntityKey> {
        self.guard().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.guard().clear();
    }

    fn guard(&self) -> MutexGuard<'_, BTreeSet<EntityKey>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn insert_is_idempotent() {
        let r = SubscriptionRegistry::new();
        assert!(r.insert(EntityKey::new("inspection", 42)));
        assert!(!r.insert(EntityKey::new("inspection", 42)));
        assert_eq!(r.len(), 1);
        assert!(r.remove(&EntityKey::new("inspection", 42)));
        assert!(!r.remove(&EntityKey::new("inspection", 42)));
        assert!(r.is_empty());
    }

    #[test]
    fn snapshot_is_sorted() {
        let r = SubscriptionRegistry::new();
        r.insert(EntityKey::new("team_schedule", 1));
        r.insert(EntityKey::new("inspection", 7));
        r.insert(EntityKey::new("inspection", 3));
        assert_eq!(
            r.snapshot(),
            vec![
                EntityKey::new("inspection", 3),
                EntityKey::new("inspection", 7),
                EntityKey::new("team_schedule", 1),
            ]
        );
    }

    #[test]
    fn concurrent_inserts_are_not_lost() {
        let r = Arc::new(SubscriptionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let r = Arc::clone(&r);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        r.insert(EntityKey::new("breach", t * 100 + i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(r.len(), 800);
    }
}
