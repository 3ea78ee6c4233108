// ============================================================================
// spark-store - Store Dispatch
// Marshals store change notifications onto the owning UI context
// ============================================================================
//
// A store may notify from any thread, but a binding's cache lives in the
// thread-local reactive graph. Each thread's context owns an `Inbox` (an
// `Arc`, so store callbacks can hold it) and a table of live bindings by id.
// Store callbacks only post the binding id; the owning thread drains the
// inbox in `dispatch_pending()` and lets each binding re-read the store.
// Posting an id twice before a drain is a no-op, so a burst of writes to
// one key is applied as a single transition.
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::core::context::with_context;
use crate::reactivity::batching::batch;
use crate::reactivity::notify::Notifier;

// =============================================================================
// BINDING ID
// =============================================================================

/// Process-unique identifier of a binding, used to route store changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value (for logging).
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

// =============================================================================
// EXTERNAL CHANGE
// =============================================================================

/// Implemented by binding internals: re-read the store and update the cache.
pub(crate) trait ExternalChange {
    /// Returns true if the cached value changed.
    fn apply_external(&self) -> bool;
}

// =============================================================================
// INBOX
// =============================================================================

/// Queue of bindings with pending store changes for one UI context.
///
/// The only piece of a context that is `Send + Sync`.
pub struct Inbox {
    pending: Mutex<Vec<BindingId>>,
    notifier: RwLock<Option<Arc<dyn Notifier>>>,
}

impl Inbox {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            notifier: RwLock::new(None),
        }
    }

    /// Queue `id` for the next drain. Wakes the notifier on the first post
    /// after a drain.
    pub fn post(&self, id: BindingId) {
        let was_empty = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.contains(&id) {
                return;
            }
            let was_empty = pending.is_empty();
            pending.push(id);
            was_empty
        };

        if was_empty {
            let notifier = self
                .notifier
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(notifier) = notifier {
                notifier.notify();
            }
        }
    }

    /// Number of bindings waiting for a drain.
    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&self) -> Vec<BindingId> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn set_notifier(&self, notifier: Option<Arc<dyn Notifier>>) {
        *self.notifier.write().unwrap_or_else(PoisonError::into_inner) = notifier;
    }
}

impl std::fmt::Debug for Inbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inbox").field("pending", &self.len()).finish()
    }
}

// =============================================================================
// DRAIN
// =============================================================================

/// Apply every store change queued for bindings owned by this thread.
///
/// Runs inside a batch, so listeners depending on several changed bindings
/// run once. Returns the number of bindings whose cached value changed.
/// Calling it from a listener while a drain is in progress returns 0.
pub fn dispatch_pending() -> usize {
    let (inbox, was_dispatching) = with_context(|ctx| (ctx.inbox(), ctx.set_dispatching(true)));
    if was_dispatching {
        return 0;
    }

    struct DispatchGuard;

    impl Drop for DispatchGuard {
        fn drop(&mut self) {
            with_context(|ctx| ctx.set_dispatching(false));
        }
    }

    let _guard = DispatchGuard;

    let ids = inbox.take();
    if ids.is_empty() {
        return 0;
    }

    tracing::trace!(queued = ids.len(), "dispatching store changes");

    batch(|| {
        let mut changed = 0;
        for id in ids {
            // Dropped bindings leave stale ids behind
            let Some(binding) = with_context(|ctx| ctx.binding(id)) else {
                continue;
            };
            if binding.apply_external() {
                changed += 1;
            }
        }
        changed
    })
}

/// Number of bindings on this thread with queued store changes.
pub fn pending_dispatch() -> usize {
    with_context(|ctx| ctx.inbox().len())
}

/// Install the notifier woken when this thread's inbox receives work.
///
/// # Example
///
/// ```
/// use spark_store::{bind_store, set_notifier, tick, ChannelNotifier, Key, MemoryStore, StoreExt};
///
/// const VOLUME: Key<u8> = Key::new("volume", || 50);
///
/// let (notifier, wake) = ChannelNotifier::new();
/// set_notifier(notifier);
///
/// let store = MemoryStore::new();
/// let volume = bind_store(VOLUME, store.clone());
///
/// let writer = std::thread::spawn({
///     let store = store.clone();
///     move || store.set_value(&VOLUME, 80)
/// });
/// writer.join().unwrap();
///
/// wake.recv().unwrap();
/// tick();
/// assert_eq!(volume.get(), 80);
/// ```
pub fn set_notifier(notifier: impl Notifier) {
    with_context(|ctx| ctx.inbox().set_notifier(Some(Arc::new(notifier))));
}

/// Remove this thread's notifier.
pub fn clear_notifier() {
    with_context(|ctx| ctx.inbox().set_notifier(None));
}

// =============================================================================
// TESTS
// =============================================================================
