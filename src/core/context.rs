// ============================================================================
// spark-store - Reactive Context
// Thread-local state for the UI context that owns bindings and effects
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use super::types::{AnyReaction, AnySource};
use crate::reactivity::dispatch::{BindingId, ExternalChange, Inbox};

// =============================================================================
// REACTIVE CONTEXT
// =============================================================================

/// Thread-local context holding all reactive state for one UI context.
///
/// Every thread that creates signals or bindings gets its own context. The
/// only part of it reachable from other threads is the [`Inbox`], which store
/// subscriptions use to queue change notifications for this thread.
pub struct ReactiveContext {
    // =========================================================================
    // REACTION TRACKING
    // =========================================================================
    /// Currently executing reaction
    pub active_reaction: RefCell<Option<Weak<dyn AnyReaction>>>,

    /// Whether reads currently skip dependency registration
    pub untracking: Cell<bool>,

    // =========================================================================
    // VERSION COUNTERS
    // =========================================================================
    /// Incremented on every signal write
    pub write_version: Cell<u32>,

    /// Incremented on every reaction run
    pub read_version: Cell<u32>,

    // =========================================================================
    // DEPENDENCY TRACKING (during reaction execution)
    // =========================================================================
    /// Dependencies collected during the current reaction run
    pub new_deps: RefCell<Vec<Rc<dyn AnySource>>>,

    /// Existing dependencies kept in place
    pub skipped_deps: Cell<usize>,

    // =========================================================================
    // BATCHING
    // =========================================================================
    pub batch_depth: Cell<u32>,

    /// Reactions waiting for the current batch or flush to finish
    pub pending_reactions: RefCell<Vec<Weak<dyn AnyReaction>>>,

    pub is_flushing_sync: Cell<bool>,

    // =========================================================================
    // STORE DISPATCH
    // =========================================================================
    /// Shared with store subscriptions created on this thread
    inbox: Arc<Inbox>,

    /// Live bindings owned by this thread, by id
    bindings: RefCell<HashMap<BindingId, Weak<dyn ExternalChange>>>,

    /// Set while the inbox is being drained
    is_dispatching: Cell<bool>,
}

impl ReactiveContext {
    /// Create a new reactive context with default values
    pub fn new() -> Self {
        Self {
            active_reaction: RefCell::new(None),
            untracking: Cell::new(false),
            write_version: Cell::new(1),
            read_version: Cell::new(0),
            new_deps: RefCell::new(Vec::new()),
            skipped_deps: Cell::new(0),
            batch_depth: Cell::new(0),
            pending_reactions: RefCell::new(Vec::new()),
            is_flushing_sync: Cell::new(false),
            inbox: Arc::new(Inbox::new()),
            bindings: RefCell::new(HashMap::new()),
            is_dispatching: Cell::new(false),
        }
    }

    // =========================================================================
    // REACTION TRACKING
    // =========================================================================

    /// Set the active reaction, returning the previous one
    pub fn set_active_reaction(
        &self,
        reaction: Option<Weak<dyn AnyReaction>>,
    ) -> Option<Weak<dyn AnyReaction>> {
        self.active_reaction.replace(reaction)
    }

    /// Get the active reaction
    pub fn get_active_reaction(&self) -> Option<Weak<dyn AnyReaction>> {
        self.active_reaction.borrow().clone()
    }

    /// Check if there's an active reaction
    pub fn has_active_reaction(&self) -> bool {
        self.active_reaction.borrow().is_some()
    }

    /// Set untracking mode, returning previous value
    pub fn set_untracking(&self, value: bool) -> bool {
        self.untracking.replace(value)
    }

    /// Check if currently untracking
    pub fn is_untracking(&self) -> bool {
        self.untracking.get()
    }

    // =========================================================================
    // VERSION COUNTERS
    // =========================================================================

    /// Increment and return the write version
    pub fn increment_write_version(&self) -> u32 {
        let v = self.write_version.get().wrapping_add(1);
        self.write_version.set(v);
        v
    }

    pub fn get_write_version(&self) -> u32 {
        self.write_version.get()
    }

    /// Increment and return the read version
    pub fn increment_read_version(&self) -> u32 {
        let v = self.read_version.get().wrapping_add(1);
        self.read_version.set(v);
        v
    }

    pub fn get_read_version(&self) -> u32 {
        self.read_version.get()
    }

    // =========================================================================
    // DEPENDENCY TRACKING
    // =========================================================================

    /// Swap out the new_deps list, returning the old one
    pub fn swap_new_deps(&self, deps: Vec<Rc<dyn AnySource>>) -> Vec<Rc<dyn AnySource>> {
        self.new_deps.replace(deps)
    }

    pub fn add_new_dep(&self, source: Rc<dyn AnySource>) {
        self.new_deps.borrow_mut().push(source);
    }

    /// Set skipped_deps count, returning previous
    pub fn set_skipped_deps(&self, count: usize) -> usize {
        self.skipped_deps.replace(count)
    }

    pub fn get_skipped_deps(&self) -> usize {
        self.skipped_deps.get()
    }

    // =========================================================================
    // BATCHING
    // =========================================================================

    /// Increment batch depth, returns new depth
    pub fn enter_batch(&self) -> u32 {
        let depth = self.batch_depth.get() + 1;
        self.batch_depth.set(depth);
        depth
    }

    /// Decrement batch depth, returns new depth
    pub fn exit_batch(&self) -> u32 {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        depth
    }

    pub fn get_batch_depth(&self) -> u32 {
        self.batch_depth.get()
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth.get() > 0
    }

    pub fn add_pending_reaction(&self, reaction: Weak<dyn AnyReaction>) {
        self.pending_reactions.borrow_mut().push(reaction);
    }

    pub fn take_pending_reactions(&self) -> Vec<Weak<dyn AnyReaction>> {
        self.pending_reactions.replace(Vec::new())
    }

    /// Set flushing sync mode, returning previous
    pub fn set_flushing_sync(&self, value: bool) -> bool {
        self.is_flushing_sync.replace(value)
    }

    pub fn is_flushing_sync(&self) -> bool {
        self.is_flushing_sync.get()
    }

    // =========================================================================
    // STORE DISPATCH
    // =========================================================================

    /// The inbox store subscriptions created on this thread post into.
    pub fn inbox(&self) -> Arc<Inbox> {
        Arc::clone(&self.inbox)
    }

    pub(crate) fn register_binding(&self, id: BindingId, binding: Weak<dyn ExternalChange>) {
        self.bindings.borrow_mut().insert(id, binding);
    }

    /// Returns true if the binding was registered.
    pub(crate) fn unregister_binding(&self, id: BindingId) -> bool {
        self.bindings.borrow_mut().remove(&id).is_some()
    }

    pub(crate) fn binding(&self, id: BindingId) -> Option<Rc<dyn ExternalChange>> {
        self.bindings.borrow().get(&id).and_then(Weak::upgrade)
    }

    /// Number of bindings registered on this thread
    pub fn binding_count(&self) -> usize {
        self.bindings.borrow().len()
    }

    /// Set dispatching mode, returning previous
    pub fn set_dispatching(&self, value: bool) -> bool {
        self.is_dispatching.replace(value)
    }

    pub fn is_dispatching(&self) -> bool {
        self.is_dispatching.get()
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// THREAD-LOCAL ACCESS
// =============================================================================

thread_local! {
    static CONTEXT: ReactiveContext = ReactiveContext::new();
}

/// Access the thread-local reactive context.
///
/// # Example
///
/// ```
/// use spark_store::with_context;
///
/// let bindings = with_context(|ctx| ctx.binding_count());
/// assert_eq!(bindings, 0);
/// ```
pub fn with_context<R>(f: impl FnOnce(&ReactiveContext) -> R) -> R {
    CONTEXT.with(f)
}

/// Like [`with_context`], but returns `None` once the thread's context has
/// been destroyed. For use from `Drop` impls.
pub(crate) fn try_with_context<R>(f: impl FnOnce(&ReactiveContext) -> R) -> Option<R> {
    CONTEXT.try_with(f).ok()
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Check if currently tracking dependencies (inside a reaction, not untracking)
pub fn is_tracking() -> bool {
    with_context(|ctx| ctx.has_active_reaction() && !ctx.is_untracking())
}

/// Check if currently untracking
pub fn is_untracking() -> bool {
    with_context(|ctx| ctx.is_untracking())
}

/// Check if currently in a batch
pub fn is_batching() -> bool {
    with_context(|ctx| ctx.is_batching())
}

/// Get the current write version
pub fn write_version() -> u32 {
    with_context(|ctx| ctx.get_write_version())
}

/// Get the current read version
pub fn read_version() -> u32 {
    with_context(|ctx| ctx.get_read_version())
}

// =============================================================================
// TESTS
// =============================================================================
