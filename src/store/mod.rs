// ============================================================================
// spark-store - Store Contract
// The external key-value store a binding observes
// ============================================================================
//
// Stores hold JSON values under string keys and notify per-key subscribers
// after every set or remove. They are shared across threads; callbacks run
// on whichever thread performed the write, so subscribers must not touch
// thread-local reactive state directly (bindings post to their inbox).
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::core::types::{default_equals, EqualsFn};
use crate::error::{Result, StoreError};

pub mod file;
pub mod key;
pub mod memory;
pub mod subscribers;

pub use file::{FileStore, FileStoreOptions};
pub use key::{Key, StoreValue};
pub use memory::MemoryStore;
pub use subscribers::SubscriberRegistry;

// =============================================================================
// EVENTS AND SUBSCRIPTIONS
// =============================================================================

/// A change to one key. `value` is `None` when the key was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    pub key: String,
    pub value: Option<Value>,
}

impl StoreEvent {
    pub fn new(key: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Handle returned by [`Store::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Callback invoked after a subscribed key changes.
pub type ChangeCallback = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

// =============================================================================
// STORE TRAIT
// =============================================================================

/// An observable key-value store.
pub trait Store: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` and notify the key's subscribers.
    fn set(&self, key: &str, value: Value);

    /// Remove the entry and notify the key's subscribers with `None`.
    fn remove(&self, key: &str);

    fn subscribe(&self, key: &str, callback: ChangeCallback) -> SubscriptionId;

    /// Returns false if the subscription was already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Snapshot of the stored keys.
    fn keys(&self) -> Vec<String>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }

    fn subscribe(&self, key: &str, callback: ChangeCallback) -> SubscriptionId {
        (**self).subscribe(key, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        (**self).unsubscribe(id)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }
}

// =============================================================================
// TYPED ACCESS
// =============================================================================

/// Typed access to any [`Store`] through [`Key`]s.
///
/// # Example
///
/// ```
/// use spark_store::{Key, MemoryStore, StoreExt};
///
/// const ZOOM: Key<f32> = Key::new("zoom", || 1.0);
///
/// let store = MemoryStore::new();
/// assert_eq!(store.value(&ZOOM), 1.0);
///
/// store.set_value(&ZOOM, 1.5);
/// assert_eq!(store.value(&ZOOM), 1.5);
/// assert!(store.contains(&ZOOM));
/// ```
pub trait StoreExt: Store {
    /// The decoded value, or the key's default when absent or undecodable.
    fn value<T: StoreValue>(&self, key: &Key<T>) -> T {
        self.get(key.name())
            .and_then(|value| decode_value(key.name(), value))
            .unwrap_or_else(|| key.default_value())
    }

    /// Encode and store `value`. Encoding failures are logged and dropped.
    fn set_value<T: StoreValue>(&self, key: &Key<T>, value: T) {
        if let Err(err) = self.try_set_value(key, value) {
            tracing::warn!(key = key.name(), error = %err, "dropping store write");
        }
    }

    /// Encode and store `value`, failing if it would not read back equal.
    fn try_set_value<T: StoreValue>(&self, key: &Key<T>, value: T) -> Result<()> {
        let encoded = encode_exact(key.name(), &value, default_equals::<T>)?;
        self.set(key.name(), encoded);
        Ok(())
    }

    fn remove_value<T: StoreValue>(&self, key: &Key<T>) {
        self.remove(key.name());
    }

    fn contains<T: StoreValue>(&self, key: &Key<T>) -> bool {
        self.get(key.name()).is_some()
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

pub(crate) fn encode_value<T: serde::Serialize>(key: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|source| StoreError::Encode {
        key: key.to_owned(),
        source,
    })
}

/// Encode `value`, rejecting encodings that decode to something `equals`
/// does not accept as the same value.
pub(crate) fn encode_exact<T: StoreValue>(
    key: &str,
    value: &T,
    equals: EqualsFn<T>,
) -> Result<Value> {
    let encoded = encode_value(key, value)?;
    match serde_json::from_value::<T>(encoded.clone()) {
        Ok(decoded) if equals(&decoded, value) => Ok(encoded),
        _ => Err(StoreError::Lossy {
            key: key.to_owned(),
        }),
    }
}

/// Decode a stored value, logging and returning `None` on a type mismatch.
pub(crate) fn decode_value<T: serde::de::DeserializeOwned>(key: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            tracing::warn!(key, error = %err, "stored value has the wrong type, using default");
            None
        }
    }
}
