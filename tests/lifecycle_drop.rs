use spark_store::{
    bind_store, effect_sync, effect_sync_with_cleanup, tick, with_context, Key, MemoryStore,
    StoreExt,
};
use std::cell::Cell;
use std::rc::Rc;

const LEVEL: Key<u32> = Key::new("level", || 1);

#[test]
fn test_effect_drop_runs_teardown() {
    let cleanup_called = Rc::new(Cell::new(false));

    {
        let cleanup_called = cleanup_called.clone();
        let _effect = effect_sync_with_cleanup(move || {
            let cc = cleanup_called.clone();
            Some(Box::new(move || cc.set(true)))
        });
    }

    assert!(cleanup_called.get(), "dropping the guard should run cleanup");
}

#[test]
fn test_binding_drop_unsubscribes() {
    let store = MemoryStore::new();
    let before = with_context(|ctx| ctx.binding_count());

    {
        let _level = bind_store(LEVEL, store.clone());
        assert_eq!(store.subscriber_count("level"), 1);
    }

    assert_eq!(store.subscriber_count("level"), 0);
    assert_eq!(with_context(|ctx| ctx.binding_count()), before);
}

#[test]
fn test_binding_drop_with_pending_change() {
    let store = MemoryStore::new();
    let level = bind_store(LEVEL, store.clone());

    store.set_value(&LEVEL, 4);
    drop(level);

    // The queued id has no binding left to apply to
    assert_eq!(tick(), 0);
}

#[test]
fn test_listener_outlives_binding() {
    let store = MemoryStore::new();
    let runs = Rc::new(Cell::new(0));

    let level = bind_store(LEVEL, store.clone());
    let listener = level.on_change({
        let runs = runs.clone();
        move |_| runs.set(runs.get() + 1)
    });
    drop(level);

    store.set_value(&LEVEL, 2);
    tick();
    assert_eq!(runs.get(), 0, "a dropped binding no longer observes the store");
    assert!(!listener.is_destroyed());
}

#[test]
fn test_listener_drop_stops_notifications() {
    let store = MemoryStore::new();
    let level = bind_store(LEVEL, store.clone());
    let runs = Rc::new(Cell::new(0));

    {
        let _listener = level.on_change({
            let runs = runs.clone();
            move |_| runs.set(runs.get() + 1)
        });
        level.set(2);
        assert_eq!(runs.get(), 1);
    }

    level.set(3);
    store.set_value(&LEVEL, 4);
    tick();
    assert_eq!(runs.get(), 1);
    assert_eq!(level.get(), 4);
}

#[test]
fn test_effect_reading_binding_stops_after_drop() {
    let store = MemoryStore::new();
    let level = bind_store(LEVEL, store.clone());
    let runs = Rc::new(Cell::new(0));

    {
        let _effect = effect_sync({
            let (level, runs) = (level.clone(), runs.clone());
            move || {
                let _ = level.get();
                runs.set(runs.get() + 1);
            }
        });
        level.set(5);
        assert_eq!(runs.get(), 2);
    }

    level.set(6);
    assert_eq!(runs.get(), 2);
}
