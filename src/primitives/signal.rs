// ============================================================================
// spark-store - Signal Primitive
// The writable reactive cell a binding caches its store value in
// ============================================================================

use std::rc::Rc;

use crate::core::types::{AnySource, EqualsFn, SourceInner};
use crate::reactivity::tracking::{notify_write, track_read};

// =============================================================================
// SIGNAL<T> - The public signal handle
// =============================================================================

/// A reactive cell holding a value of type T.
///
/// When the value changes, every effect that read it re-runs. Clones share
/// the same cell.
///
/// # Example
///
/// ```
/// use spark_store::signal;
///
/// let count = signal(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T> {
    inner: Rc<SourceInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self {
            inner: Rc::new(SourceInner::new(value)),
        }
    }

    /// Create a new signal with a custom equality function.
    pub fn new_with_equals(value: T, equals: EqualsFn<T>) -> Self {
        Self {
            inner: Rc::new(SourceInner::new_with_equals(value, equals)),
        }
    }

    /// Get the current value, registering a dependency inside an effect.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        track_read(self.inner.clone());
        self.inner.get()
    }

    /// Get the current value without registering a dependency.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.inner.get()
    }

    /// Access the current value with a closure (avoids cloning).
    ///
    /// # Example
    ///
    /// ```
    /// use spark_store::signal;
    ///
    /// let items = signal(vec![1, 2, 3]);
    /// let sum = items.with(|v| v.iter().sum::<i32>());
    /// assert_eq!(sum, 6);
    /// ```
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        track_read(self.inner.clone());
        self.inner.with(f)
    }

    /// Set the value.
    ///
    /// Returns true if the value changed. Equal values send no notifications.
    pub fn set(&self, value: T) -> bool {
        let changed = self.inner.set(value);
        if changed {
            notify_write(self.inner.clone());
        }
        changed
    }

    /// Update the value through a closure applied to a copy.
    ///
    /// # Example
    ///
    /// ```
    /// use spark_store::signal;
    ///
    /// let count = signal(0);
    /// count.update(|n| *n += 1);
    /// assert_eq!(count.get(), 1);
    /// ```
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool
    where
        T: Clone,
    {
        let mut next = self.inner.get();
        f(&mut next);
        self.set(next)
    }

    /// Whether `value` equals the current value under this signal's equality.
    pub fn is_equal(&self, value: &T) -> bool {
        self.inner.is_equal(value)
    }

    /// Get a reference to the inner source (for advanced use).
    pub fn inner(&self) -> &Rc<SourceInner<T>> {
        &self.inner
    }

    /// Get the inner source as a type-erased AnySource.
    pub fn as_any_source(&self) -> Rc<dyn AnySource> {
        self.inner.clone()
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner
            .with(|value| f.debug_struct("Signal").field("value", value).finish())
    }
}

// =============================================================================
// SIGNAL CREATION FUNCTIONS
// =============================================================================

/// Create a new reactive signal.
pub fn signal<T>(value: T) -> Signal<T>
where
    T: PartialEq + 'static,
{
    Signal::new(value)
}

/// Create a signal with a custom equality function.
///
/// # Example
///
/// ```
/// use spark_store::primitives::signal::signal_with_equals;
///
/// let always_notify = signal_with_equals(0, |_, _| false);
/// assert!(always_notify.set(0));
/// ```
pub fn signal_with_equals<T>(value: T, equals: EqualsFn<T>) -> Signal<T>
where
    T: 'static,
{
    Signal::new_with_equals(value, equals)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::*;

    #[test]
    fn signal_set_reports_change() {
        let s = signal(String::from("a"));
        assert!(s.set(String::from("b")));
        assert!(!s.set(String::from("b")));
        assert_eq!(s.get(), "b");
    }

    #[test]
    fn signal_clone_shares_state() {
        let a = signal(1);
        let b = a.clone();
        b.set(2);
        assert_eq!(a.get(), 2);
    }

    #[test]
    fn update_through_copy() {
        let s = signal(vec![1, 2]);
        assert!(s.update(|v| v.push(3)));
        assert!(!s.update(|_| {}));
        assert_eq!(s.get(), vec![1, 2, 3]);
    }

    #[test]
    fn signal_is_a_source() {
        let s = signal(0u32);
        assert!(s.as_any_source().flags() & SOURCE != 0);
    }

    #[test]
    fn peek_matches_get() {
        let s = signal(Some(3));
        assert_eq!(s.peek(), s.get());
    }
}
