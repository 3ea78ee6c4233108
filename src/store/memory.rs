// ============================================================================
// spark-store - In-Memory Store
// ============================================================================

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde_json::{Map, Value};

use super::subscribers::SubscriberRegistry;
use super::{ChangeCallback, Store, StoreEvent, SubscriptionId};

struct MemoryInner {
    name: Option<String>,
    values: RwLock<BTreeMap<String, Value>>,
    subscribers: SubscriberRegistry,
}

/// A process-local store. Clones share the same map and subscribers.
///
/// Every `set` notifies the key's subscribers, even when the value did not
/// change; suppressing no-op updates is left to the observers.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// An isolated store labelled `name` in logs.
    pub fn named(name: impl Into<String>) -> Self {
        Self::build(Some(name.into()))
    }

    fn build(name: Option<String>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                name,
                values: RwLock::new(BTreeMap::new()),
                subscribers: SubscriberRegistry::new(),
            }),
        }
    }

    /// The process-wide default store.
    ///
    /// ```
    /// use spark_store::{Key, MemoryStore, StoreExt};
    ///
    /// const LAUNCHES: Key<u32> = Key::new("doc.launches", || 0);
    ///
    /// MemoryStore::standard().set_value(&LAUNCHES, 3);
    /// assert_eq!(MemoryStore::standard().value(&LAUNCHES), 3);
    /// ```
    pub fn standard() -> Self {
        static STANDARD: OnceLock<MemoryStore> = OnceLock::new();
        STANDARD.get_or_init(|| MemoryStore::named("standard")).clone()
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.read_values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry, notifying each removed key.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.write_values());
        for key in removed.into_keys() {
            self.notify(StoreEvent::new(key, None));
        }
    }

    /// Copy of the contents as a JSON object.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.read_values()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner.subscribers.count_for(key)
    }

    /// Replace the contents without notifying. Used when loading from disk.
    pub(crate) fn replace_silently(&self, values: Map<String, Value>) {
        *self.write_values() = values.into_iter().collect();
    }

    fn notify(&self, event: StoreEvent) {
        let delivered = self.inner.subscribers.notify(&event);
        tracing::trace!(
            store = self.name().unwrap_or("memory"),
            key = %event.key,
            removed = event.value.is_none(),
            delivered,
            "store changed"
        );
    }

    fn read_values(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.inner.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_values(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Value>> {
        self.inner.values.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("name", &self.inner.name)
            .field("len", &self.len())
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.read_values().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.write_values().insert(key.to_owned(), value.clone());
        self.notify(StoreEvent::new(key, Some(value)));
    }

    fn remove(&self, key: &str) {
        let removed = self.write_values().remove(key);
        if removed.is_some() {
            self.notify(StoreEvent::new(key, None));
        }
    }

    fn subscribe(&self, key: &str, callback: ChangeCallback) -> SubscriptionId {
        self.inner.subscribers.subscribe(key, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.unsubscribe(id)
    }

    fn keys(&self) -> Vec<String> {
        self.read_values().keys().cloned().collect()
    }
}
