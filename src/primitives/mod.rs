// ============================================================================
// spark-store - Primitives Module
// Signals, effects and store bindings
// ============================================================================

pub mod bind;
pub mod effect;
pub mod signal;

pub use bind::{bind_store, bind_store_with_equals, StoreBinding};
pub use effect::{
    destroy_effect, effect, effect_sync, effect_sync_with_cleanup, effect_with_cleanup,
    update_effect, CleanupFn, Effect, EffectFn, EffectInner,
};
pub use signal::{signal, signal_with_equals, Signal};
