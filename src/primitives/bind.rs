// ============================================================================
// spark-store - Store Bindings
// A reactive, cached view of one key in an external store
// ============================================================================
//
// A binding keeps the value of one key in a signal so effects can depend on
// it, and keeps that signal in step with the store in both directions:
//
// - Writes through the binding go to the store first, then to the cache.
// - Writes made directly on the store (any thread) post the binding's id to
//   its thread's inbox. The next drain re-reads the store and updates the
//   cache only if the value differs, which also absorbs the echo of the
//   binding's own writes.
// ============================================================================

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::core::constants::*;
use crate::core::context::{try_with_context, with_context};
use crate::core::types::EqualsFn;
use crate::primitives::effect::{create_effect, Effect};
use crate::primitives::signal::Signal;
use crate::reactivity::batching::untrack;
use crate::reactivity::dispatch::{BindingId, ExternalChange};
use crate::store::{
    decode_value, encode_exact, Key, Store, StoreEvent, StoreValue, SubscriptionId,
};

// =============================================================================
// BINDING INNER
// =============================================================================

struct BindingInner<T> {
    id: BindingId,
    key: Key<T>,
    store: Arc<dyn Store>,
    cache: Signal<T>,
    /// `None` once torn down
    subscription: Cell<Option<SubscriptionId>>,
}

impl<T> BindingInner<T> {
    fn teardown(&self) -> bool {
        let Some(subscription) = self.subscription.take() else {
            return false;
        };

        self.store.unsubscribe(subscription);
        try_with_context(|ctx| ctx.unregister_binding(self.id));

        tracing::debug!(
            key = self.key.name(),
            binding = self.id.as_u64(),
            "store binding torn down"
        );
        true
    }
}

impl<T: StoreValue> ExternalChange for BindingInner<T> {
    fn apply_external(&self) -> bool {
        if self.subscription.get().is_none() {
            return false;
        }

        let next = read_store(&*self.store, &self.key);
        if self.cache.is_equal(&next) {
            tracing::debug!(
                key = self.key.name(),
                binding = self.id.as_u64(),
                "store change matches cache, ignoring"
            );
            return false;
        }

        self.cache.set(next)
    }
}

impl<T> Drop for BindingInner<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn read_store<T: StoreValue>(store: &dyn Store, key: &Key<T>) -> T {
    store
        .get(key.name())
        .and_then(|value| decode_value(key.name(), value))
        .unwrap_or_else(|| key.default_value())
}

// =============================================================================
// STORE BINDING
// =============================================================================

/// A reactive binding to one key of a [`Store`].
///
/// Reading with [`get`](Self::get) inside an effect makes the effect re-run
/// whenever the cached value changes, whether the change came through this
/// binding or directly through the store. Store-originated changes are
/// applied when the owning thread drains its inbox ([`tick`](crate::tick)).
///
/// Clones share the same cache and subscription. The binding is torn down
/// when the last clone is dropped, or earlier with [`teardown`](Self::teardown).
///
/// # Example
///
/// ```
/// use spark_store::{bind_store, effect, tick, Key, MemoryStore, StoreExt};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// const THEME: Key<String> = Key::new("theme", || "light".into());
///
/// let store = MemoryStore::new();
/// let theme = bind_store(THEME, store.clone());
///
/// let rendered = Rc::new(RefCell::new(Vec::new()));
/// let _dispose = effect({
///     let (theme, rendered) = (theme.clone(), rendered.clone());
///     move || rendered.borrow_mut().push(theme.get())
/// });
///
/// theme.set("dark".into());
/// assert_eq!(store.value(&THEME), "dark");
///
/// store.set_value(&THEME, "solarized".into());
/// tick();
///
/// assert_eq!(*rendered.borrow(), ["light", "dark", "solarized"]);
/// ```
pub struct StoreBinding<T> {
    inner: Rc<BindingInner<T>>,
}

impl<T> Clone for StoreBinding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: StoreValue> StoreBinding<T> {
    fn new(key: Key<T>, store: Arc<dyn Store>, equals: Option<EqualsFn<T>>) -> Self {
        let id = BindingId::next();
        let inbox = with_context(|ctx| ctx.inbox());

        // Subscribe before the initial read so no write can fall between them
        let subscription = store.subscribe(
            key.name(),
            Arc::new(move |_: &StoreEvent| inbox.post(id)),
        );

        let initial = read_store(&*store, &key);
        let cache = match equals {
            Some(equals) => Signal::new_with_equals(initial, equals),
            None => Signal::new(initial),
        };

        let inner = Rc::new(BindingInner {
            id,
            key,
            store,
            cache,
            subscription: Cell::new(Some(subscription)),
        });

        let weak = Rc::downgrade(&inner) as Weak<dyn ExternalChange>;
        with_context(|ctx| ctx.register_binding(id, weak));

        tracing::debug!(key = key.name(), binding = id.as_u64(), "store binding created");

        Self { inner }
    }

    /// The cached value. Registers a dependency when called in an effect.
    pub fn get(&self) -> T {
        self.inner.cache.get()
    }

    /// The cached value, without registering a dependency.
    pub fn peek(&self) -> T {
        self.inner.cache.peek()
    }

    /// Borrow the cached value. Registers a dependency like [`get`](Self::get).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.cache.with(f)
    }

    /// Write `value` to the store and the cache.
    ///
    /// Returns false without touching the store if `value` equals the cached
    /// value, or if it does not read back from the store as an equal value
    /// (non-finite floats, `Some(None)`).
    pub fn set(&self, value: T) -> bool {
        let inner = &self.inner;
        if inner.cache.is_equal(&value) {
            return false;
        }

        let equals = inner.cache.inner().equals_fn();
        let encoded = match encode_exact(inner.key.name(), &value, equals) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(key = inner.key.name(), error = %err, "dropping binding write");
                return false;
            }
        };

        inner.store.set(inner.key.name(), encoded);
        inner.cache.set(value)
    }

    /// Modify a copy of the cached value and write it back.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.peek();
        f(&mut next);
        self.set(next)
    }

    /// Remove the key from the store and move the cache to the key's default.
    ///
    /// Returns true if the cached value changed.
    pub fn reset(&self) -> bool {
        self.inner.store.remove(self.inner.key.name());
        self.inner.cache.set(self.inner.key.default_value())
    }

    /// Call `f` with the new value after each change of the cached value.
    ///
    /// Not called for the current value. Changes applied in one batch or
    /// drain are reported once, with the final value. Stops when the returned
    /// guard is dropped.
    pub fn on_change<F>(&self, f: F) -> Effect
    where
        F: FnMut(T) + 'static,
    {
        let cache = self.inner.cache.clone();
        let mut f = f;
        let mut first_run = true;

        let listener = create_effect(
            EFFECT | USER_EFFECT | LISTENER_EFFECT,
            Box::new(move || {
                let value = cache.get();
                if std::mem::take(&mut first_run) {
                    return None;
                }
                untrack(|| f(value));
                None
            }),
            true,
        );

        Effect::from_inner(listener)
    }

    /// Stop observing the store. Idempotent.
    ///
    /// The binding keeps its last value. Later writes through it still reach
    /// the store, but store changes are no longer picked up.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub fn is_active(&self) -> bool {
        self.inner.subscription.get().is_some()
    }

    pub fn key(&self) -> Key<T> {
        self.inner.key
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    pub fn id(&self) -> BindingId {
        self.inner.id
    }

    /// The signal holding the cached value, for APIs that take a [`Signal`].
    ///
    /// Setting it directly changes only the local cache; write through the
    /// binding to reach the store.
    pub fn as_signal(&self) -> Signal<T> {
        self.inner.cache.clone()
    }
}

impl<T: StoreValue + std::fmt::Debug> std::fmt::Debug for StoreBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.cache.inner().with(|value| {
            f.debug_struct("StoreBinding")
                .field("key", &self.inner.key.name())
                .field("value", value)
                .field("active", &self.is_active())
                .finish()
        })
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Bind to `key` in `store`, reading its current value now.
///
/// An absent or undecodable entry reads as the key's default.
pub fn bind_store<T, S>(key: Key<T>, store: S) -> StoreBinding<T>
where
    T: StoreValue,
    S: Store,
{
    StoreBinding::new(key, Arc::new(store), None)
}

/// Bind with a custom equality test for echo suppression and no-op writes.
///
/// ```
/// use spark_store::{bind_store_with_equals, safe_equals_f64, Key, MemoryStore};
///
/// const RATIO: Key<f64> = Key::new("ratio", || f64::NAN);
///
/// let ratio = bind_store_with_equals(RATIO, MemoryStore::new(), safe_equals_f64);
/// assert!(!ratio.set(f64::NAN));
/// ```
pub fn bind_store_with_equals<T, S>(key: Key<T>, store: S, equals: EqualsFn<T>) -> StoreBinding<T>
where
    T: StoreValue,
    S: Store,
{
    StoreBinding::new(key, Arc::new(store), Some(equals))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactivity::batching::tick;
    use crate::store::{MemoryStore, StoreExt};
    use serde_json::Value;
    use std::cell::RefCell;

    const COUNT: Key<i64> = Key::new("count", || 0);

    #[test]
    fn construct_reads_store_or_default() {
        let store = MemoryStore::new();
        assert_eq!(bind_store(COUNT, store.clone()).get(), 0);

        store.set_value(&COUNT, 4);
        assert_eq!(bind_store(COUNT, store).get(), 4);
    }

    #[test]
    fn construct_subscribes_and_registers() {
        let store = MemoryStore::new();
        let before = with_context(|ctx| ctx.binding_count());

        let binding = bind_store(COUNT, store.clone());
        assert!(binding.is_active());
        assert_eq!(store.subscriber_count("count"), 1);
        assert_eq!(with_context(|ctx| ctx.binding_count()), before + 1);

        drop(binding);
        assert_eq!(store.subscriber_count("count"), 0);
        assert_eq!(with_context(|ctx| ctx.binding_count()), before);
    }

    #[test]
    fn equal_write_skips_store() {
        let store = MemoryStore::new();
        let writes = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        store.subscribe(
            "count",
            Arc::new({
                let writes = writes.clone();
                move |_: &StoreEvent| {
                    writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
            }),
        );

        let binding = bind_store(COUNT, store.clone());
        assert!(!binding.set(0));
        assert_eq!(writes.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(!store.contains(&COUNT));

        assert!(binding.set(3));
        assert_eq!(writes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn own_write_echo_is_suppressed() {
        let store = MemoryStore::new();
        let binding = bind_store(COUNT, store);

        binding.set(8);
        assert_eq!(crate::pending_dispatch(), 1);
        assert_eq!(tick(), 0);
        assert_eq!(binding.get(), 8);
    }

    #[test]
    fn external_change_applies_on_drain() {
        let store = MemoryStore::new();
        let binding = bind_store(COUNT, store.clone());

        store.set_value(&COUNT, 5);
        assert_eq!(binding.peek(), 0);
        assert_eq!(tick(), 1);
        assert_eq!(binding.peek(), 5);
    }

    #[test]
    fn burst_of_external_writes_coalesces() {
        let store = MemoryStore::new();
        let binding = bind_store(COUNT, store.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _listener = binding.on_change({
            let seen = seen.clone();
            move |value| seen.borrow_mut().push(value)
        });

        for n in 1..=5 {
            store.set_value(&COUNT, n);
        }
        tick();

        assert_eq!(*seen.borrow(), vec![5]);
    }

    #[test]
    fn undecodable_value_reads_default() {
        let store = MemoryStore::new();
        store.set("count", Value::String("many".into()));

        let binding = bind_store(COUNT, store.clone());
        assert_eq!(binding.get(), 0);

        store.set_value(&COUNT, 2);
        tick();
        store.set("count", Value::Bool(true));
        tick();
        assert_eq!(binding.get(), 0);
    }

    #[test]
    fn reset_removes_and_restores_default() {
        let store = MemoryStore::new();
        let binding = bind_store(COUNT, store.clone());
        binding.set(11);

        assert!(binding.reset());
        assert!(!store.contains(&COUNT));
        assert_eq!(binding.get(), 0);
        assert!(!binding.reset());
    }

    #[test]
    fn update_writes_through() {
        let store = MemoryStore::new();
        let binding = bind_store(COUNT, store.clone());

        assert!(binding.update(|n| *n += 2));
        assert_eq!(store.value(&COUNT), 2);
        assert!(!binding.update(|_| {}));
    }

    #[test]
    fn on_change_skips_initial_value() {
        let binding = bind_store(COUNT, MemoryStore::new());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let listener = binding.on_change({
            let seen = seen.clone();
            move |value| seen.borrow_mut().push(value)
        });
        assert!(seen.borrow().is_empty());

        binding.set(1);
        binding.set(2);
        assert_eq!(*seen.borrow(), vec![1, 2]);

        drop(listener);
        binding.set(3);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn teardown_is_idempotent() {
        let store = MemoryStore::new();
        let binding = bind_store(COUNT, store.clone());

        binding.teardown();
        binding.teardown();
        assert!(!binding.is_active());
        assert_eq!(store.subscriber_count("count"), 0);
    }

    #[test]
    fn after_teardown_writes_reach_store_but_changes_do_not_return() {
        let store = MemoryStore::new();
        let binding = bind_store(COUNT, store.clone());
        binding.teardown();

        assert!(binding.set(6));
        assert_eq!(store.value(&COUNT), 6);

        store.set_value(&COUNT, 9);
        tick();
        assert_eq!(binding.get(), 6);
    }

    #[test]
    fn clones_share_binding() {
        let store = MemoryStore::new();
        let a = bind_store(COUNT, store.clone());
        let b = a.clone();

        b.set(4);
        assert_eq!(a.peek(), 4);
        assert_eq!(a.id(), b.id());

        drop(a);
        assert!(b.is_active());
    }

    #[test]
    fn non_finite_float_write_is_rejected() {
        const RATIO: Key<f64> = Key::new("ratio", || 1.0);

        let store = MemoryStore::new();
        let ratio = bind_store(RATIO, store.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _listener = ratio.on_change({
            let seen = seen.clone();
            move |value| seen.borrow_mut().push(value)
        });

        assert!(!ratio.set(f64::INFINITY));
        assert!(!ratio.set(f64::NAN));
        assert!(!store.contains(&RATIO));

        tick();
        assert_eq!(ratio.get(), 1.0);
        assert!(seen.borrow().is_empty());

        assert!(ratio.set(2.5));
        tick();
        assert_eq!(ratio.get(), 2.5);
        assert_eq!(*seen.borrow(), vec![2.5]);
    }

    #[test]
    fn nan_write_is_rejected_with_nan_safe_equality() {
        use crate::reactivity::equality::safe_equals_f64;
        const RATIO: Key<f64> = Key::new("ratio", || 1.0);

        let ratio = bind_store_with_equals(RATIO, MemoryStore::new(), safe_equals_f64);
        assert!(!ratio.set(f64::NAN));
        tick();
        assert_eq!(ratio.get(), 1.0);
    }

    #[test]
    fn collapsing_nested_option_is_rejected() {
        const PINNED: Key<Option<Option<u8>>> = Key::optional("pinned");

        let store = MemoryStore::new();
        let pinned = bind_store(PINNED, store.clone());

        assert!(!pinned.set(Some(None)));
        assert!(!store.contains(&PINNED));
        tick();
        assert_eq!(pinned.get(), None);

        assert!(pinned.set(Some(Some(3))));
        tick();
        assert_eq!(pinned.get(), Some(Some(3)));
    }

    #[test]
    fn accessors() {
        let binding = bind_store(COUNT, MemoryStore::new());
        assert_eq!(binding.key().name(), "count");
        assert!(binding.store().keys().is_empty());
        assert_eq!(binding.as_signal().get(), 0);
        assert!(format!("{binding:?}").contains("count"));
    }
}
