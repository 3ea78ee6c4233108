// ============================================================================
// spark-store - Macros
// ============================================================================

/// Clone handles into a move closure.
///
/// Saves the `let x = x.clone();` lines before handing bindings or signals
/// to an effect.
///
/// ```rust
/// use spark_store::{bind_store, cloned, effect, Key, MemoryStore};
///
/// const NAME: Key<String> = Key::new("name", String::new);
/// const GREETING: Key<String> = Key::new("greeting", || "hello".into());
///
/// let store = MemoryStore::new();
/// let name = bind_store(NAME, store.clone());
/// let greeting = bind_store(GREETING, store);
///
/// let _dispose = effect(cloned!(name, greeting => move || {
///     let _line = format!("{}, {}", greeting.get(), name.get());
/// }));
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Create an effect over cloned handles.
///
/// Wraps `effect(cloned!(... => move || ...))` and returns the dispose
/// function.
///
/// ```rust
/// use spark_store::{bind_store, Key, MemoryStore};
///
/// const MUTED: Key<bool> = Key::new("muted", || false);
///
/// let muted = bind_store(MUTED, MemoryStore::new());
///
/// let dispose = spark_store::effect!(muted => {
///     let _icon = if muted.get() { "off" } else { "on" };
/// });
/// dispose();
/// ```
#[macro_export]
macro_rules! effect {
    ($($deps:ident),+ => $body:expr) => {
        $crate::effect($crate::cloned!($($deps),+ => move || $body))
    };
    ($body:expr) => {
        $crate::effect(move || $body)
    };
}
