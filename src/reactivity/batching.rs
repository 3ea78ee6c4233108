// ============================================================================
// spark-store - Batching
// Group multiple updates into a single reaction cycle
// ============================================================================

use crate::core::context::with_context;
use crate::reactivity::dispatch::dispatch_pending;
use crate::reactivity::scheduling::flush_sync;

// =============================================================================
// BATCH
// =============================================================================

/// Batch multiple updates into a single reaction cycle.
///
/// Without batching, each cache change re-runs its listeners immediately.
/// With batching, listeners run once after all updates complete.
///
/// # Example
///
/// ```
/// use spark_store::{batch, effect, signal};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let a = signal(1);
/// let b = signal(2);
/// let run_count = Rc::new(Cell::new(0));
///
/// let _dispose = effect({
///     let (a, b, run_count) = (a.clone(), b.clone(), run_count.clone());
///     move || {
///         let _ = a.get() + b.get();
///         run_count.set(run_count.get() + 1);
///     }
/// });
/// assert_eq!(run_count.get(), 1);
///
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// });
///
/// assert_eq!(run_count.get(), 2);
/// ```
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    with_context(|ctx| ctx.enter_batch());

    // Exit the batch even on panic
    struct BatchGuard;

    impl Drop for BatchGuard {
        fn drop(&mut self) {
            let (depth, flushing) =
                with_context(|ctx| (ctx.exit_batch(), ctx.is_flushing_sync()));

            // An outer flush picks up whatever was queued
            if depth == 0 && !flushing {
                flush_sync();
            }
        }
    }

    let _guard = BatchGuard;
    f()
}

// =============================================================================
// UNTRACK
// =============================================================================

/// Read values without creating dependencies.
///
/// # Example
///
/// ```
/// use spark_store::{effect, signal, untrack};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let a = signal(1);
/// let b = signal(2);
/// let run_count = Rc::new(Cell::new(0));
///
/// let _dispose = effect({
///     let (a, b, run_count) = (a.clone(), b.clone(), run_count.clone());
///     move || {
///         let _ = a.get();
///         let _ = untrack(|| b.get());
///         run_count.set(run_count.get() + 1);
///     }
/// });
///
/// b.set(20);
/// assert_eq!(run_count.get(), 1);
///
/// a.set(10);
/// assert_eq!(run_count.get(), 2);
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let prev = with_context(|ctx| ctx.set_untracking(true));

    struct UntrackGuard {
        prev: bool,
    }

    impl Drop for UntrackGuard {
        fn drop(&mut self) {
            with_context(|ctx| ctx.set_untracking(self.prev));
        }
    }

    let _guard = UntrackGuard { prev };
    f()
}

/// Alias for [`untrack`].
pub fn peek<T>(f: impl FnOnce() -> T) -> T {
    untrack(f)
}

// =============================================================================
// TICK
// =============================================================================

/// Run one update cycle on the current UI context.
///
/// Applies store changes queued for this thread's bindings, then flushes
/// every pending effect. Host event loops call this when their
/// [`Notifier`](crate::Notifier) fires; tests call it to settle external
/// writes. Returns the number of bindings whose cached value changed.
///
/// # Example
///
/// ```
/// use spark_store::{bind_store, tick, Key, MemoryStore, StoreExt};
///
/// const NAME: Key<String> = Key::new("name", String::new);
///
/// let store = MemoryStore::new();
/// let name = bind_store(NAME, store.clone());
///
/// store.set_value(&NAME, "world".to_string());
/// assert_eq!(name.get(), "");
///
/// assert_eq!(tick(), 1);
/// assert_eq!(name.get(), "world");
/// ```
pub fn tick() -> usize {
    let changed = dispatch_pending();
    flush_sync();
    changed
}

// =============================================================================
// TESTS
// =============================================================================
