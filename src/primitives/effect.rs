// ============================================================================
// spark-store - Effect System
// Side effects that re-run when the values they read change
// ============================================================================
//
// Effects are the listener side of a binding: a UI re-render, a log line,
// a derived write. They track which signals and bindings they read and
// re-run when any of them changes.
//
// Key features:
// - Automatic dependency tracking
// - Cleanup functions run before each re-run and on disposal
// - RAII disposal through the `Effect` guard
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{AnyReaction, AnySource};
use crate::reactivity::scheduling::schedule_effect;
use crate::reactivity::tracking::{remove_reactions, set_signal_status};

// =============================================================================
// TYPE ALIASES
// =============================================================================

/// Cleanup function returned by effects, runs before next execution
pub type CleanupFn = Box<dyn FnOnce()>;

/// Effect function signature - returns optional cleanup
pub type EffectFn = Box<dyn FnMut() -> Option<CleanupFn>>;

// =============================================================================
// EFFECT INNER
// =============================================================================

/// The inner effect implementation.
pub struct EffectInner {
    flags: Cell<u32>,

    /// Write version when this effect last ran
    write_version: Cell<u32>,

    func: RefCell<Option<EffectFn>>,

    deps: RefCell<Vec<Rc<dyn AnySource>>>,

    /// Cleanup from the last run
    teardown: RefCell<Option<CleanupFn>>,

    /// Set after Rc creation
    self_weak: RefCell<Weak<EffectInner>>,
}

impl EffectInner {
    /// Create a new effect inner
    pub fn new(effect_type: u32, func: Option<EffectFn>) -> Rc<Self> {
        let effect = Rc::new(Self {
            flags: Cell::new(effect_type | DIRTY),
            write_version: Cell::new(0),
            func: RefCell::new(func),
            deps: RefCell::new(Vec::new()),
            teardown: RefCell::new(None),
            self_weak: RefCell::new(Weak::new()),
        });

        *effect.self_weak.borrow_mut() = Rc::downgrade(&effect);

        effect
    }

    /// Get this effect as a weak reference to AnyReaction
    pub fn as_weak_reaction(&self) -> Weak<dyn AnyReaction> {
        match self.self_weak.borrow().upgrade() {
            Some(rc) => Rc::downgrade(&(rc as Rc<dyn AnyReaction>)),
            None => Weak::<EffectInner>::new() as Weak<dyn AnyReaction>,
        }
    }

    /// Write version recorded at the end of the last run
    pub fn last_run_version(&self) -> u32 {
        self.write_version.get()
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        if let Some(cleanup) = self.teardown.get_mut().take() {
            cleanup();
        }
    }
}

// =============================================================================
// AnyReaction IMPLEMENTATION
// =============================================================================

impl AnyReaction for EffectInner {
    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    fn dep_count(&self) -> usize {
        self.deps.borrow().len()
    }

    fn add_dep(&self, source: Rc<dyn AnySource>) {
        self.deps.borrow_mut().push(source);
    }

    fn remove_deps_from(&self, start: usize) {
        self.deps.borrow_mut().truncate(start);
    }

    fn for_each_dep(&self, f: &mut dyn FnMut(&Rc<dyn AnySource>) -> bool) {
        for dep in self.deps.borrow().iter() {
            if !f(dep) {
                break;
            }
        }
    }

    fn update(&self) {
        if (self.flags.get() & DESTROYED) != 0 {
            return;
        }

        let rc_self = self.self_weak.borrow().upgrade();
        if let Some(rc_self) = rc_self {
            update_effect(&rc_self);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// EFFECT WRAPPER
// =============================================================================

/// Owning handle to an effect. Dropping the last handle disposes it.
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    pub(crate) fn from_inner(inner: Rc<EffectInner>) -> Self {
        Self { inner }
    }

    /// Get access to the inner effect
    pub fn inner(&self) -> &Rc<EffectInner> {
        &self.inner
    }

    /// Check if this effect is destroyed
    pub fn is_destroyed(&self) -> bool {
        (self.inner.flags.get() & DESTROYED) != 0
    }

    /// Destroy this effect now. Safe to call more than once.
    pub fn dispose(&self) {
        destroy_effect(self.inner.clone());
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        if Rc::strong_count(&self.inner) == 1 {
            self.dispose();
        }
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("destroyed", &self.is_destroyed())
            .field("deps", &self.inner.dep_count())
            .finish()
    }
}

// =============================================================================
// TEARDOWN / DESTROY
// =============================================================================

/// Run an effect's teardown function
pub(crate) fn execute_teardown(effect: &EffectInner) {
    let teardown = effect.teardown.borrow_mut().take();
    if let Some(cleanup) = teardown {
        cleanup();
    }
}

/// Destroy an effect: unlink it from its dependencies and run its cleanup.
pub fn destroy_effect(effect: Rc<EffectInner>) {
    if (effect.flags.get() & DESTROYED) != 0 {
        return;
    }

    remove_reactions(effect.clone() as Rc<dyn AnyReaction>, 0);
    effect.set_flags(effect.flags() | DESTROYED);
    execute_teardown(&effect);

    // Drop captured state now rather than when the last Rc goes
    let func = effect.func.borrow_mut().take();
    drop(func);
}

// =============================================================================
// UPDATE EFFECT - Run an effect
// =============================================================================

/// Run an effect and track its dependencies.
///
/// 1. Marks the effect clean and runs the previous teardown
/// 2. Executes the effect function with this effect as the active reaction
/// 3. Replaces the dependency list with what was read during the run
/// 4. Stores the new teardown if one was returned
pub fn update_effect(effect: &Rc<EffectInner>) {
    if (effect.flags.get() & DESTROYED) != 0 {
        return;
    }

    set_signal_status(&**effect, CLEAN);
    execute_teardown(effect);

    let prev_reaction = with_context(|ctx| {
        let prev = ctx.set_active_reaction(Some(effect.as_weak_reaction()));
        ctx.increment_read_version();
        ctx.set_skipped_deps(0);
        ctx.swap_new_deps(Vec::new());
        effect.set_flags(effect.flags() | REACTION_IS_UPDATING);
        prev
    });

    // Restore the outer reaction even if the effect panics
    struct RestoreGuard<'a> {
        effect: &'a Rc<EffectInner>,
        prev: Option<Option<Weak<dyn AnyReaction>>>,
    }

    impl Drop for RestoreGuard<'_> {
        fn drop(&mut self) {
            let prev = self.prev.take().flatten();
            let effect = self.effect;
            let new_deps = with_context(|ctx| {
                effect.set_flags(effect.flags() & !REACTION_IS_UPDATING);
                ctx.set_active_reaction(prev);
                ctx.swap_new_deps(Vec::new())
            });

            remove_reactions(effect.clone() as Rc<dyn AnyReaction>, 0);
            let as_reaction: Rc<dyn AnyReaction> = effect.clone();
            for dep in new_deps {
                dep.add_reaction(Rc::downgrade(&as_reaction));
                effect.add_dep(dep);
            }

            effect
                .write_version
                .set(with_context(|ctx| ctx.increment_write_version()));
        }
    }

    let guard = RestoreGuard {
        effect,
        prev: Some(prev_reaction),
    };

    let teardown = {
        let mut func_borrow = effect.func.borrow_mut();
        match func_borrow.as_mut() {
            Some(func) => func(),
            None => None,
        }
    };

    drop(guard);

    *effect.teardown.borrow_mut() = teardown;
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Create an effect that runs now and again whenever what it read changes.
///
/// Returns a dispose function. Dropping it without calling it also stops the
/// effect, since it holds the only strong reference.
///
/// # Example
///
/// ```
/// use spark_store::{effect, signal};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = signal(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let dispose = effect({
///     let (count, seen) = (count.clone(), seen.clone());
///     move || seen.set(count.get())
/// });
/// assert_eq!(seen.get(), 0);
///
/// count.set(1);
/// assert_eq!(seen.get(), 1);
///
/// dispose();
/// count.set(2);
/// assert_eq!(seen.get(), 1);
/// ```
pub fn effect<F>(mut f: F) -> impl FnOnce()
where
    F: FnMut() + 'static,
{
    effect_with_cleanup(move || {
        f();
        None
    })
}

/// Create an effect that can return a cleanup function.
///
/// The cleanup runs before each re-execution and when disposed.
pub fn effect_with_cleanup<F>(f: F) -> impl FnOnce()
where
    F: FnMut() -> Option<CleanupFn> + 'static,
{
    let effect = create_effect(EFFECT | USER_EFFECT, Box::new(f), false);
    move || destroy_effect(effect)
}

/// Create an effect that runs immediately, even inside a batch.
///
/// Returns an [`Effect`] guard rather than a dispose closure.
pub fn effect_sync<F>(mut f: F) -> Effect
where
    F: FnMut() + 'static,
{
    effect_sync_with_cleanup(move || {
        f();
        None
    })
}

/// Create a sync effect that can return a cleanup function.
pub fn effect_sync_with_cleanup<F>(f: F) -> Effect
where
    F: FnMut() -> Option<CleanupFn> + 'static,
{
    Effect::from_inner(create_effect(
        EFFECT | RENDER_EFFECT | USER_EFFECT,
        Box::new(f),
        true,
    ))
}

// =============================================================================
// CREATE EFFECT (Internal)
// =============================================================================

/// Create an effect and either run it now (`sync`) or schedule it.
pub(crate) fn create_effect(effect_type: u32, func: EffectFn, sync: bool) -> Rc<EffectInner> {
    let effect = EffectInner::new(effect_type, Some(func));

    if sync {
        update_effect(&effect);
    } else {
        schedule_effect(effect.clone());
    }
    effect.set_flags(effect.flags() | EFFECT_RAN);

    effect
}

// =============================================================================
// TESTS
// =============================================================================
