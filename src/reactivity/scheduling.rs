// ============================================================================
// spark-store - Effect Scheduling
// Handles scheduling listener effects for execution
// ============================================================================
//
// There are no microtasks, so scheduling is synchronous with explicit flush:
// a dirty effect runs right after the write that dirtied it, unless a batch
// or an outer flush is in progress, in which case it runs when that ends.
// ============================================================================

use std::rc::Rc;

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::AnyReaction;
use crate::reactivity::tracking::is_dirty;

// =============================================================================
// SCHEDULE EFFECT
// =============================================================================

/// Queue an effect and flush immediately unless batching or already flushing.
pub fn schedule_effect(effect: Rc<dyn AnyReaction>) {
    let should_flush = with_context(|ctx| {
        ctx.add_pending_reaction(Rc::downgrade(&effect));
        !ctx.is_batching() && !ctx.is_flushing_sync()
    });

    if should_flush {
        flush_sync();
    }
}

// =============================================================================
// FLUSH
// =============================================================================

/// Run every pending reaction once. Returns how many ran.
pub fn flush_pending_reactions() -> usize {
    let pending = with_context(|ctx| ctx.take_pending_reactions());
    let mut ran = 0;

    for reaction_weak in pending {
        let Some(reaction) = reaction_weak.upgrade() else {
            continue;
        };

        let flags = reaction.flags();
        if (flags & (INERT | DESTROYED)) != 0 {
            continue;
        }

        if (flags & EFFECT) != 0 && is_dirty(&*reaction) {
            reaction.update();
            ran += 1;
        }
    }

    ran
}

/// Synchronously flush all pending effects.
///
/// Effects that dirty other effects are picked up in the next round.
///
/// # Panics
///
/// Panics with "Maximum update depth exceeded" if effects keep re-triggering
/// each other for more than [`MAX_FLUSH_COUNT`] rounds.
pub fn flush_sync() {
    let was_flushing = with_context(|ctx| ctx.set_flushing_sync(true));

    struct FlushGuard {
        was_flushing: bool,
    }

    impl Drop for FlushGuard {
        fn drop(&mut self) {
            with_context(|ctx| ctx.set_flushing_sync(self.was_flushing));
        }
    }

    let _guard = FlushGuard { was_flushing };

    let mut flush_count = 0u32;
    loop {
        let has_pending = with_context(|ctx| !ctx.pending_reactions.borrow().is_empty());
        if !has_pending {
            break;
        }

        flush_count += 1;
        if flush_count > MAX_FLUSH_COUNT {
            with_context(|ctx| ctx.take_pending_reactions());
            panic!(
                "Maximum update depth exceeded. This can happen when an effect \
                 continuously triggers itself, for example a listener that \
                 writes back a value derived from the one it just received."
            );
        }

        flush_pending_reactions();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::effect::effect;
    use crate::primitives::signal::signal;
    use std::cell::Cell;

    #[test]
    fn flush_with_nothing_pending_is_noop() {
        flush_sync();
        assert_eq!(flush_pending_reactions(), 0);
    }

    #[test]
    fn flush_runs_effects_queued_during_batch() {
        let count = signal(0);
        let seen = Rc::new(Cell::new(0));

        let _dispose = effect({
            let count = count.clone();
            let seen = seen.clone();
            move || seen.set(count.get())
        });

        with_context(|ctx| ctx.enter_batch());
        count.set(7);
        assert_eq!(seen.get(), 0);
        with_context(|ctx| ctx.exit_batch());

        flush_sync();
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn flushing_flag_restored_after_flush() {
        flush_sync();
        assert!(!with_context(|ctx| ctx.is_flushing_sync()));
    }
}
