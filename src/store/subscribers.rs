// ============================================================================
// spark-store - Subscriber Registry
// Per-key change callbacks shared by the store backends
// ============================================================================

use std::sync::{Arc, PoisonError, RwLock};

use super::{ChangeCallback, StoreEvent, SubscriptionId};

struct Subscriber {
    id: SubscriptionId,
    key: String,
    callback: ChangeCallback,
}

/// Thread-safe list of per-key subscribers.
///
/// Callbacks are collected under the lock and invoked after it is released,
/// so a callback may subscribe, unsubscribe or write to the store.
#[derive(Default)]
pub struct SubscriberRegistry {
    entries: RwLock<Vec<Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, key: &str, callback: ChangeCallback) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                key: key.to_owned(),
                callback,
            });
        id
    }

    /// Returns false if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    /// Invoke every callback registered for `event.key`, in registration order.
    pub fn notify(&self, event: &StoreEvent) -> usize {
        let callbacks: Vec<ChangeCallback> = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries
                .iter()
                .filter(|entry| entry.key == event.key)
                .map(|entry| Arc::clone(&entry.callback))
                .collect()
        };

        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of subscribers for one key.
    pub fn count_for(&self, key: &str) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.key == key)
            .count()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (ChangeCallback, Arc<Mutex<Vec<StoreEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let callback: ChangeCallback = Arc::new({
            let seen = seen.clone();
            move |event: &StoreEvent| seen.lock().unwrap().push(event.clone())
        });
        (callback, seen)
    }

    #[test]
    fn notifies_only_matching_key() {
        let registry = SubscriberRegistry::new();
        let (callback, seen) = recorder();
        registry.subscribe("a", callback);

        assert_eq!(registry.notify(&StoreEvent::new("b", None)), 0);
        assert_eq!(registry.notify(&StoreEvent::new("a", Some(1.into()))), 1);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].value, Some(1.into()));
    }

    #[test]
    fn unsubscribe_twice_reports_false() {
        let registry = SubscriberRegistry::new();
        let (callback, _) = recorder();
        let id = registry.subscribe("a", callback);

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let registry = Arc::new(SubscriberRegistry::new());
        let id_slot = Arc::new(Mutex::new(None));

        let id = registry.subscribe(
            "k",
            Arc::new({
                let registry = Arc::downgrade(&registry);
                let id_slot = id_slot.clone();
                move |_: &StoreEvent| {
                    if let (Some(registry), Some(id)) = (registry.upgrade(), *id_slot.lock().unwrap())
                    {
                        registry.unsubscribe(id);
                    }
                }
            }),
        );
        *id_slot.lock().unwrap() = Some(id);

        registry.notify(&StoreEvent::new("k", None));
        assert_eq!(registry.count_for("k"), 0);
    }
}
