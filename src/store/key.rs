// ============================================================================
// spark-store - Typed Keys
// ============================================================================

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Values that can live in a store and be cached by a binding.
///
/// Blanket-implemented for every type that qualifies.
pub trait StoreValue: Serialize + DeserializeOwned + Clone + PartialEq + 'static {}

impl<T> StoreValue for T where T: Serialize + DeserializeOwned + Clone + PartialEq + 'static {}

/// A store key paired with its value type and default.
///
/// The default is what a binding reads when the store has no entry for the
/// key, or when the entry doesn't decode as `T`. Keys are `Copy` and can be
/// declared as constants:
///
/// ```
/// use spark_store::Key;
///
/// const THEME: Key<String> = Key::new("theme", || "light".to_string());
/// const LAST_FILE: Key<Option<String>> = Key::optional("last_file");
///
/// assert_eq!(THEME.name(), "theme");
/// assert_eq!(THEME.default_value(), "light");
/// assert_eq!(LAST_FILE.default_value(), None);
/// ```
pub struct Key<T> {
    name: &'static str,
    default: fn() -> T,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    pub const fn new(name: &'static str, default: fn() -> T) -> Self {
        Self {
            name,
            default,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// A fresh copy of the default value.
    pub fn default_value(&self) -> T {
        (self.default)()
    }
}

impl<T> Key<Option<T>> {
    /// A key whose default is `None`.
    pub const fn optional(name: &'static str) -> Self {
        fn none<T>() -> Option<T> {
            None
        }
        Self::new(name, none::<T>)
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}

impl<T> fmt::Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNT: Key<u32> = Key::new("count", || 7);

    #[test]
    fn default_is_fresh_each_time() {
        let key: Key<Vec<u8>> = Key::new("bytes", Vec::new);
        let mut first = key.default_value();
        first.push(1);
        assert!(key.default_value().is_empty());
    }

    #[test]
    fn keys_are_copy() {
        let a = COUNT;
        let b = a;
        assert_eq!(a.name(), b.name());
        assert_eq!(b.default_value(), 7);
    }

    #[test]
    fn display_and_debug_show_name() {
        assert_eq!(COUNT.to_string(), "count");
        assert_eq!(format!("{COUNT:?}"), "Key(\"count\")");
    }
}
