// ============================================================================
// spark-store - Dependency Tracking
// Tracking reads of binding caches and propagating writes to listeners
// ============================================================================
//
// The key challenge in Rust is borrow scoping: RefCell borrows must be
// released before mutating, using the "collect-then-mutate" pattern.
// ============================================================================

use std::rc::Rc;

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{AnyReaction, AnySource};
use crate::reactivity::scheduling::schedule_effect;

// =============================================================================
// TRACK READ - Register dependency when reading a signal
// =============================================================================

/// Track a read of a source, registering it as a dependency if inside a reaction.
///
/// Called by `Signal::get()` and `StoreBinding::get()` before returning the
/// value.
pub fn track_read(source: Rc<dyn AnySource>) {
    with_context(|ctx| {
        if !ctx.has_active_reaction() || ctx.is_untracking() {
            return;
        }

        let Some(reaction) = ctx.get_active_reaction().and_then(|w| w.upgrade()) else {
            return;
        };

        if (reaction.flags() & REACTION_IS_UPDATING) != 0 {
            // Version-based deduplication within one run
            let read_version = ctx.get_read_version();
            if source.read_version() < read_version {
                source.set_read_version(read_version);
                ctx.add_new_dep(source);
            }
        } else {
            reaction.add_dep(source.clone());
            source.add_reaction(Rc::downgrade(&reaction));
        }
    });
}

// =============================================================================
// NOTIFY WRITE - Called when a signal's value changes
// =============================================================================

/// Notify the reactive system that a source's value has changed.
///
/// Called by `Signal::set()` after the value is updated.
pub fn notify_write(source: Rc<dyn AnySource>) {
    with_context(|ctx| {
        let wv = ctx.increment_write_version();
        source.set_write_version(wv);
    });

    mark_reactions(source, DIRTY);
}

// =============================================================================
// MARK REACTIONS - Propagate dirty state to listeners
// =============================================================================

/// Mark all reactions of a source with the given status and schedule the
/// effects that just became dirty.
///
/// # Borrow Safety
/// Reactions are collected into a temporary Vec first so the source's
/// reaction list is not borrowed while effects run (an effect may read the
/// same source and re-register itself).
pub fn mark_reactions(source: Rc<dyn AnySource>, status: u32) {
    source.cleanup_dead_reactions();

    let reactions: Vec<Rc<dyn AnyReaction>> = {
        let mut collected = Vec::new();
        source.for_each_reaction(&mut |reaction| {
            collected.push(reaction);
            true
        });
        collected
    };

    let mut effects_to_schedule = Vec::new();
    for reaction in reactions {
        let flags = reaction.flags();
        if (flags & DIRTY) != 0 {
            continue;
        }

        set_signal_status(&*reaction, status);
        if (flags & EFFECT) != 0 {
            effects_to_schedule.push(reaction);
        }
    }

    for effect in effects_to_schedule {
        schedule_effect(effect);
    }
}

// =============================================================================
// STATUS HELPERS
// =============================================================================

/// Set the status flags of a reaction (CLEAN, DIRTY).
pub fn set_signal_status(target: &dyn AnyReaction, status: u32) {
    target.set_flags((target.flags() & STATUS_MASK) | status);
}

/// Check if a reaction is dirty and needs to be updated.
pub fn is_dirty(reaction: &dyn AnyReaction) -> bool {
    (reaction.flags() & DIRTY) != 0
}

// =============================================================================
// REMOVE REACTIONS - Clean up stale dependencies
// =============================================================================

/// Remove a reaction from its dependencies, starting at the given index.
///
/// When a reaction re-runs its dependencies might change; this unlinks it
/// from sources it no longer reads.
pub fn remove_reactions(reaction: Rc<dyn AnyReaction>, start: usize) {
    let deps_to_remove: Vec<Rc<dyn AnySource>> = {
        let mut collected = Vec::new();
        let mut idx = 0;
        reaction.for_each_dep(&mut |dep| {
            if idx >= start {
                collected.push(dep.clone());
            }
            idx += 1;
            true
        });
        collected
    };

    for dep in deps_to_remove {
        dep.remove_reaction(&reaction);
    }

    reaction.remove_deps_from(start);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SourceInner;
    use std::any::Any;
    use std::cell::{Cell, RefCell};

    /// A reaction that counts its runs without scheduling through effects.
    struct MockReaction {
        flags: Cell<u32>,
        deps: RefCell<Vec<Rc<dyn AnySource>>>,
        runs: Cell<u32>,
    }

    impl MockReaction {
        fn new(flags: u32) -> Rc<Self> {
            Rc::new(Self {
                flags: Cell::new(flags | CLEAN),
                deps: RefCell::new(Vec::new()),
                runs: Cell::new(0),
            })
        }
    }

    impl AnyReaction for MockReaction {
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
            self.runs.set(self.runs.get() + 1);
            self.mark_clean();
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn link(source: &Rc<SourceInner<i32>>, reaction: &Rc<MockReaction>) {
        let as_reaction: Rc<dyn AnyReaction> = reaction.clone();
        reaction.add_dep(source.clone());
        source.add_reaction(Rc::downgrade(&as_reaction));
    }

    #[test]
    fn write_marks_plain_reactions_dirty() {
        let source = Rc::new(SourceInner::new(0));
        let reaction = MockReaction::new(0);
        link(&source, &reaction);

        notify_write(source.clone());

        assert!(reaction.is_dirty());
        assert_eq!(reaction.runs.get(), 0, "non-effects are never scheduled");
    }

    #[test]
    fn write_runs_effect_reactions() {
        let source = Rc::new(SourceInner::new(0));
        let reaction = MockReaction::new(EFFECT);
        link(&source, &reaction);

        notify_write(source.clone());

        assert_eq!(reaction.runs.get(), 1);
        assert!(reaction.is_clean());
    }

    #[test]
    fn write_bumps_write_version() {
        let source = Rc::new(SourceInner::new(0));
        let before = crate::core::context::write_version();

        notify_write(source.clone());

        assert!(source.write_version() > before);
    }

    #[test]
    fn remove_reactions_unlinks_tail() {
        let a = Rc::new(SourceInner::new(1));
        let b = Rc::new(SourceInner::new(2));
        let reaction = MockReaction::new(EFFECT);
        link(&a, &reaction);
        link(&b, &reaction);

        remove_reactions(reaction.clone(), 1);

        assert_eq!(reaction.dep_count(), 1);
        assert_eq!(a.reaction_count(), 1);
        assert_eq!(b.reaction_count(), 0);
    }

    #[test]
    fn dropped_reactions_are_pruned_on_write() {
        let source = Rc::new(SourceInner::new(0));
        {
            let reaction = MockReaction::new(EFFECT);
            link(&source, &reaction);
            assert_eq!(source.reaction_count(), 1);
        }

        notify_write(source.clone());
        assert_eq!(source.reaction_count(), 0);
    }
}
