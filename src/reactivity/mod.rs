// ============================================================================
// spark-store - Reactivity Module
// Dependency tracking, scheduling, batching and store-change dispatch
// ============================================================================

pub mod batching;
pub mod dispatch;
pub mod equality;
pub mod notify;
pub mod scheduling;
pub mod tracking;

pub use tracking::{is_dirty, mark_reactions, notify_write, remove_reactions, set_signal_status, track_read};

pub use scheduling::{flush_pending_reactions, flush_sync};

pub use batching::{batch, peek, tick, untrack};

pub use dispatch::{
    clear_notifier, dispatch_pending, pending_dispatch, set_notifier, BindingId, Inbox,
};

pub use notify::{ChannelNotifier, FnNotifier, NoopNotifier, Notifier};
