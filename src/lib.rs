// ============================================================================
// spark-store - Reactive bindings to persistent key-value stores
// ============================================================================
//
// A `StoreBinding` caches one key of a `Store` in a signal. Effects that read
// it re-run when the value changes, whether it was written through the
// binding or directly on the store from any thread. Store changes are
// delivered to the thread that owns the binding through a per-thread inbox,
// drained by `tick()`.
// ============================================================================

#[macro_use]
mod macros;

pub mod core;
pub mod error;
pub mod primitives;
pub mod reactivity;
pub mod store;

// Re-export core items at crate root for ergonomic access
pub use crate::core::constants;
pub use crate::core::context::{
    is_batching, is_tracking, is_untracking, read_version, with_context, write_version,
    ReactiveContext,
};
pub use crate::core::types::{default_equals, AnyReaction, AnySource, EqualsFn, SourceInner};

pub use error::{Result, StoreError};

pub use primitives::bind::{bind_store, bind_store_with_equals, StoreBinding};
pub use primitives::effect::{
    effect, effect_sync, effect_sync_with_cleanup, effect_with_cleanup,
    CleanupFn, Effect, EffectFn, EffectInner,
};
pub use primitives::signal::{signal, signal_with_equals, Signal};

pub use reactivity::batching::{batch, peek, tick, untrack};
pub use reactivity::dispatch::{
    clear_notifier, dispatch_pending, pending_dispatch, set_notifier, BindingId, Inbox,
};
pub use reactivity::equality::{equals, never_equals, safe_equals_f32, safe_equals_f64};
pub use reactivity::notify::{ChannelNotifier, FnNotifier, NoopNotifier, Notifier};
pub use reactivity::scheduling::flush_sync;

pub use store::{
    ChangeCallback, FileStore, FileStoreOptions, Key, MemoryStore, Store, StoreEvent, StoreExt,
    StoreValue, SubscriberRegistry, SubscriptionId,
};

// =============================================================================
// TESTS
// =============================================================================
