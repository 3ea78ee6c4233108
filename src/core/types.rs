// ============================================================================
// spark-store - Type Definitions
// Type-erased traits and base types for the reactive graph
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::constants::*;

// =============================================================================
// TYPE-ERASED TRAITS
// =============================================================================
//
// Graph operations (mark dirty, track deps, schedule) don't need the value
// type T. Only reading/writing values needs T. A binding's cache is a
// SourceInner<T>; listeners are EffectInner. Both are stored type-erased:
// - Vec<Rc<dyn AnySource>> for an effect's dependencies
// - Vec<Weak<dyn AnyReaction>> for a source's reactions
// =============================================================================

/// Type-erased source interface for reactive graph operations.
pub trait AnySource: Any {
    /// Get the flags bitmask
    fn flags(&self) -> u32;

    /// Set the flags bitmask
    fn set_flags(&self, flags: u32);

    /// Get the write version (incremented when value changes)
    fn write_version(&self) -> u32;

    /// Set the write version
    fn set_write_version(&self, version: u32);

    /// Get the read version (for dependency deduplication)
    fn read_version(&self) -> u32;

    /// Set the read version
    fn set_read_version(&self, version: u32);

    /// Number of reactions depending on this source
    fn reaction_count(&self) -> usize;

    /// Add a reaction that depends on this source
    fn add_reaction(&self, reaction: Weak<dyn AnyReaction>);

    /// Remove dead (dropped) reactions from the list
    fn cleanup_dead_reactions(&self);

    /// Iterate over live reactions. Return false from `f` to stop.
    fn for_each_reaction(&self, f: &mut dyn FnMut(Rc<dyn AnyReaction>) -> bool);

    /// Remove a specific reaction from this source's reactions list.
    fn remove_reaction(&self, reaction: &Rc<dyn AnyReaction>);

    /// Check if this source is dirty
    fn is_dirty(&self) -> bool {
        self.flags() & DIRTY != 0
    }

    /// Check if this source is clean
    fn is_clean(&self) -> bool {
        self.flags() & CLEAN != 0
    }

    /// Mark as dirty (clear status bits, set DIRTY)
    fn mark_dirty(&self) {
        self.set_flags((self.flags() & STATUS_MASK) | DIRTY);
    }

    /// Mark as clean (clear status bits, set CLEAN)
    fn mark_clean(&self) {
        self.set_flags((self.flags() & STATUS_MASK) | CLEAN);
    }

    /// Upcast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Type-erased reaction interface for scheduling and updates.
///
/// Implemented by `EffectInner`. A reaction is notified when one of its
/// dependencies changes.
pub trait AnyReaction: Any {
    /// Get the flags bitmask
    fn flags(&self) -> u32;

    /// Set the flags bitmask
    fn set_flags(&self, flags: u32);

    /// Number of dependencies
    fn dep_count(&self) -> usize;

    /// Add a dependency (a source this reaction reads from)
    fn add_dep(&self, source: Rc<dyn AnySource>);

    /// Remove dependencies starting from index
    fn remove_deps_from(&self, start: usize);

    /// Iterate over dependencies
    fn for_each_dep(&self, f: &mut dyn FnMut(&Rc<dyn AnySource>) -> bool);

    /// Run the reaction
    fn update(&self);

    /// Check if this is an effect
    fn is_effect(&self) -> bool {
        self.flags() & EFFECT != 0
    }

    /// Check if this reaction is dirty
    fn is_dirty(&self) -> bool {
        self.flags() & DIRTY != 0
    }

    /// Check if this reaction is clean
    fn is_clean(&self) -> bool {
        self.flags() & CLEAN != 0
    }

    /// Check if this reaction is destroyed
    fn is_destroyed(&self) -> bool {
        self.flags() & DESTROYED != 0
    }

    /// Mark as dirty
    fn mark_dirty(&self) {
        self.set_flags((self.flags() & STATUS_MASK) | DIRTY);
    }

    /// Mark as clean
    fn mark_clean(&self) {
        self.set_flags((self.flags() & STATUS_MASK) | CLEAN);
    }

    /// Upcast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

// =============================================================================
// SOURCE INNER (the data behind Signal<T>)
// =============================================================================

/// Equality function type for comparing values.
///
/// Bindings use it to decide whether an incoming store value is a real
/// transition or an echo of what the cache already holds.
pub type EqualsFn<T> = fn(&T, &T) -> bool;

/// Default equality using PartialEq
pub fn default_equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// The internal data for a signal source.
///
/// Separate from Signal<T> so it can be stored as Rc<dyn AnySource>.
pub struct SourceInner<T> {
    flags: Cell<u32>,
    value: RefCell<T>,
    write_version: Cell<u32>,
    read_version: Cell<u32>,
    /// Weak refs to avoid cycles
    reactions: RefCell<Vec<Weak<dyn AnyReaction>>>,
    equals: EqualsFn<T>,
}

impl<T> SourceInner<T> {
    /// Create a new source with the given value
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::new_with_equals(value, default_equals)
    }

    /// Create a new source with a custom equality function
    pub fn new_with_equals(value: T, equals: EqualsFn<T>) -> Self {
        Self {
            flags: Cell::new(SOURCE | CLEAN),
            value: RefCell::new(value),
            write_version: Cell::new(0),
            read_version: Cell::new(0),
            reactions: RefCell::new(Vec::new()),
            equals,
        }
    }

    /// Get the current value (cloning)
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    /// Get the current value with a closure (avoids clone)
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Compare `other` against the current value with this source's equality.
    pub fn is_equal(&self, other: &T) -> bool {
        (self.equals)(&self.value.borrow(), other)
    }

    /// Set the value, returning true if it changed
    pub fn set(&self, value: T) -> bool {
        if self.is_equal(&value) {
            return false;
        }

        *self.value.borrow_mut() = value;
        self.write_version.set(self.write_version.get() + 1);
        true
    }

    /// Get the equality function
    pub fn equals_fn(&self) -> EqualsFn<T> {
        self.equals
    }
}

impl<T: 'static> AnySource for SourceInner<T> {
    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    fn write_version(&self) -> u32 {
        self.write_version.get()
    }

    fn set_write_version(&self, version: u32) {
        self.write_version.set(version);
    }

    fn read_version(&self) -> u32 {
        self.read_version.get()
    }

    fn set_read_version(&self, version: u32) {
        self.read_version.set(version);
    }

    fn reaction_count(&self) -> usize {
        self.reactions.borrow().len()
    }

    fn add_reaction(&self, reaction: Weak<dyn AnyReaction>) {
        self.reactions.borrow_mut().push(reaction);
    }

    fn cleanup_dead_reactions(&self) {
        self.reactions.borrow_mut().retain(|w| w.strong_count() > 0);
    }

    fn for_each_reaction(&self, f: &mut dyn FnMut(Rc<dyn AnyReaction>) -> bool) {
        let reactions = self.reactions.borrow();
        for weak in reactions.iter() {
            if let Some(rc) = weak.upgrade() {
                if !f(rc) {
                    break;
                }
            }
        }
    }

    fn remove_reaction(&self, reaction: &Rc<dyn AnyReaction>) {
        // Pointer identity; dead entries go too
        let reaction_ptr = Rc::as_ptr(reaction) as *const ();
        self.reactions.borrow_mut().retain(|weak| match weak.upgrade() {
            Some(rc) => Rc::as_ptr(&rc) as *const () != reaction_ptr,
            None => false,
        });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_inner_set_skips_equal_values() {
        let source = SourceInner::new(String::from("a"));

        assert!(source.set(String::from("b")));
        assert_eq!(source.write_version(), 1);

        assert!(!source.set(String::from("b")));
        assert_eq!(source.write_version(), 1);
    }

    #[test]
    fn source_inner_custom_equality() {
        fn same_len(a: &String, b: &String) -> bool {
            a.len() == b.len()
        }

        let source = SourceInner::new_with_equals(String::from("abc"), same_len);
        assert!(source.is_equal(&String::from("xyz")));
        assert!(!source.set(String::from("xyz")));
        assert_eq!(source.get(), "abc");
    }

    #[test]
    fn heterogeneous_source_storage() {
        let sources: Vec<Rc<dyn AnySource>> = vec![
            Rc::new(SourceInner::new(42i32)),
            Rc::new(SourceInner::new(String::from("hello"))),
            Rc::new(SourceInner::new(Some(true))),
        ];

        for source in &sources {
            assert!(source.flags() & SOURCE != 0);
            assert!(source.is_clean());
        }

        sources[0].mark_dirty();
        assert!(sources[0].is_dirty());
        assert!(sources[1].is_clean());
    }

    #[test]
    fn downcast_from_any_source() {
        let any_source: Rc<dyn AnySource> = Rc::new(SourceInner::new(7u8));
        let inner = any_source
            .as_any()
            .downcast_ref::<SourceInner<u8>>()
            .expect("concrete type");
        assert_eq!(inner.get(), 7);
    }
}
