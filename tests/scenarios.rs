use spark_store::{bind_store, tick, Key, MemoryStore, Store, StoreExt};
use std::cell::RefCell;
use std::rc::Rc;

const GREETING: Key<String> = Key::new("greeting", String::new);

fn record(binding: &spark_store::StoreBinding<String>) -> (spark_store::Effect, Rc<RefCell<Vec<String>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let listener = binding.on_change({
        let seen = seen.clone();
        move |value| seen.borrow_mut().push(value)
    });
    (listener, seen)
}

#[test]
fn scenario_a_empty_store_reads_default() {
    let store = MemoryStore::new();
    let greeting = bind_store(GREETING, store.clone());

    assert_eq!(greeting.get(), "");
    assert!(store.get("greeting").is_none(), "construct must not write");
}

#[test]
fn scenario_b_write_reaches_store() {
    let store = MemoryStore::new();
    let greeting = bind_store(GREETING, store.clone());

    assert!(greeting.set("hello".to_string()));
    assert_eq!(greeting.get(), "hello");
    assert_eq!(store.value(&GREETING), "hello");
}

#[test]
fn scenario_c_external_write_fires_listener_once() {
    let store = MemoryStore::new();
    let greeting = bind_store(GREETING, store.clone());
    let (_listener, seen) = record(&greeting);

    store.set_value(&GREETING, "world".to_string());
    tick();

    assert_eq!(*seen.borrow(), ["world"]);
    assert_eq!(greeting.get(), "world");

    // A second drain with nothing new stays quiet
    tick();
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn scenario_d_repeated_write_notifies_once() {
    let store = MemoryStore::new();
    let greeting = bind_store(GREETING, store);
    let (_listener, seen) = record(&greeting);

    assert!(greeting.set("x".to_string()));
    assert!(!greeting.set("x".to_string()));
    tick();

    assert_eq!(*seen.borrow(), ["x"]);
}

#[test]
fn read_after_write() {
    let greeting = bind_store(GREETING, MemoryStore::new());
    for value in ["a", "b", "", "a"] {
        greeting.set(value.to_string());
        assert_eq!(greeting.get(), value);
    }
}

#[test]
fn external_write_of_equal_value_is_silent() {
    let store = MemoryStore::new();
    let greeting = bind_store(GREETING, store.clone());
    greeting.set("same".to_string());
    let (_listener, seen) = record(&greeting);

    store.set_value(&GREETING, "same".to_string());
    assert_eq!(tick(), 0);
    assert!(seen.borrow().is_empty());
}

#[test]
fn external_remove_reverts_to_default() {
    let store = MemoryStore::new();
    let greeting = bind_store(GREETING, store.clone());
    greeting.set("bye".to_string());

    store.remove_value(&GREETING);
    tick();
    assert_eq!(greeting.get(), "");
}

#[test]
fn teardown_twice_is_harmless() {
    let store = MemoryStore::new();
    let greeting = bind_store(GREETING, store.clone());
    let (_listener, seen) = record(&greeting);

    greeting.teardown();
    greeting.teardown();
    assert!(!greeting.is_active());

    store.set_value(&GREETING, "ignored".to_string());
    tick();
    assert!(seen.borrow().is_empty());
    assert_eq!(greeting.get(), "");
}

#[test]
fn external_and_local_writes_interleave() {
    let store = MemoryStore::new();
    let greeting = bind_store(GREETING, store.clone());
    let (_listener, seen) = record(&greeting);

    greeting.set("one".to_string());
    store.set_value(&GREETING, "two".to_string());
    tick();
    greeting.set("three".to_string());
    tick();

    assert_eq!(*seen.borrow(), ["one", "two", "three"]);
    assert_eq!(store.value(&GREETING), "three");
}
