//! Coordinating several actions through a registry

use action_dispatch::prelude::*;
use action_dispatch::{settle, StreamProbe};

type Store = ActionStore<u32, u32>;
type Registry = ActionRegistry<u32, u32>;

fn store() -> Store {
    Store::with_config(ActionStoreConfig::new().quiet())
}

fn is_working(state: &ActionContextState<u32, u32>) -> bool {
    state.is_working()
}

#[test]
fn test_add_twice_without_remove_fails() {
    let registry = Registry::new();
    registry.add_store_source("save", store()).unwrap();

    let err = registry.add_store_source("save", store());
    assert!(matches!(
        err,
        Err(RegistryError::KeyAlreadyRegistered(ref key)) if key.name() == "save"
    ));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_check_any_over_empty_and_mixed_maps() {
    let registry = Registry::new();
    assert!(!registry.check_any(is_working, false));
    assert!(registry.check_any(is_working, true));

    let working = store();
    working.trigger();
    registry.add_store_source("working", working).unwrap();
    registry.add_store_source("idle", store()).unwrap();

    assert!(registry.check_any(is_working, false));
}

#[test]
fn test_keyed_instance_follows_slot_inside_registry() {
    let registry = Registry::new();
    let slot = ActionStoreSlot::new();
    registry.add_store_source("delete", slot.clone()).unwrap();

    let instance = registry.source_for_key("delete");
    let mut states = StreamProbe::new(instance.action_state());
    assert!(states.drain().is_empty());

    let first = store();
    slot.set(first.clone());
    assert_eq!(states.drain(), vec![ActionState::Idle]);

    instance.trigger();
    assert_eq!(states.drain(), vec![ActionState::Triggered]);
    assert_eq!(first.current_state().action_state, ActionState::Triggered);

    // a fresh store replaces the triggered one
    slot.set(store());
    assert_eq!(states.drain(), vec![ActionState::Idle]);
}

#[test]
fn test_disable_siblings_while_one_is_working() {
    let registry = Registry::new();
    let upload = store();
    let delete = store();
    registry.add_store_source("upload", upload.clone()).unwrap();
    registry.add_store_source("delete", delete.clone()).unwrap();

    let mut busy = StreamProbe::new(registry.watch_any(is_working, false));
    let apply = |busy: bool| {
        if busy {
            delete.disable(Some("sibling-working"));
        } else {
            delete.enable(Some("sibling-working"));
        }
    };

    for flag in busy.drain() {
        apply(flag);
    }
    assert!(delete.current_state().can_trigger());

    upload.trigger();
    for flag in busy.drain() {
        apply(flag);
    }
    assert!(!delete.trigger());

    upload.resolve(None);
    for flag in busy.drain() {
        apply(flag);
    }
    assert!(delete.trigger());
}

#[tokio::test]
async fn test_executor_on_registry_key() {
    let registry = Registry::new();
    let instance = registry.source_for_key("double");
    let mut executor = WorkExecutor::new(instance.clone());
    executor.set_value_fn(|v: u32| v * 2);
    executor.spawn();

    let target = store();
    registry.add_store_source("double", target.clone()).unwrap();
    settle().await;

    assert!(instance.trigger_with_value(21));
    settle().await;
    assert_eq!(target.current_state().result, Some(42));

    let total = registry.reduce_from_all_sources(
        0,
        |store| store.current_state().result.unwrap_or(0),
        |acc, n| acc + n,
    );
    assert_eq!(total, 42);
}
