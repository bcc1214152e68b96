//! Keyed collection of action sources
//!
//! The registry is passed explicitly to the code that needs it. Features that
//! coordinate several actions (for example "disable every sibling while one is
//! working") look sources up by [`ActionKey`] or aggregate over all of them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{StreamExt, StreamMap};

use crate::error::RegistryError;
use crate::instance::ActionInstance;
use crate::source::ActionStoreSource;
use crate::state::{ActionContextState, ActionValue};
use crate::store::ActionStore;
use crate::stream::{self, ActionStream};

/// Key of a registry entry.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ActionKey(String);

impl ActionKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ActionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

type SharedSource<T, O> = Arc<dyn ActionStoreSource<T, O>>;
type Entries<T, O> = HashMap<ActionKey, SharedSource<T, O>>;

/// Identity of a registry entry, for change detection.
fn entry_id<T, O>(entry: &Option<SharedSource<T, O>>) -> Option<usize> {
    entry
        .as_ref()
        .map(|source| Arc::as_ptr(source) as *const () as usize)
}

/// Keyed map of action sources.
///
/// Clones share the same entries.
pub struct ActionRegistry<T, O> {
    entries: Arc<watch::Sender<Entries<T, O>>>,
}

impl<T, O> Clone for ActionRegistry<T, O> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T: ActionValue, O: ActionValue> Default for ActionRegistry<T, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ActionValue, O: ActionValue> fmt::Debug for ActionRegistry<T, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl<T: ActionValue, O: ActionValue> ActionRegistry<T, O> {
    pub fn new() -> Self {
        let (entries, _) = watch::channel(HashMap::new());
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Register `source` under `key`.
    ///
    /// Fails if `key` is already registered; remove the previous source first.
    pub fn add_store_source<S>(
        &self,
        key: impl Into<ActionKey>,
        source: S,
    ) -> Result<(), RegistryError>
    where
        S: ActionStoreSource<T, O> + 'static,
    {
        self.add_shared_source(key, Arc::new(source))
    }

    pub fn add_shared_source(
        &self,
        key: impl Into<ActionKey>,
        source: SharedSource<T, O>,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        let mut inserted = false;
        self.entries.send_if_modified(|entries| {
            if entries.contains_key(&key) {
                return false;
            }
            entries.insert(key.clone(), source);
            inserted = true;
            true
        });

        if !inserted {
            return Err(RegistryError::KeyAlreadyRegistered(key));
        }
        tracing::debug!(key = %key, "action source registered");
        Ok(())
    }

    /// Remove the source under `key`, if any
    pub fn remove_store_source(&self, key: impl Into<ActionKey>) -> Option<SharedSource<T, O>> {
        let key = key.into();
        let mut removed = None;
        self.entries.send_if_modified(|entries| {
            removed = entries.remove(&key);
            removed.is_some()
        });

        match removed {
            Some(source) => {
                tracing::debug!(key = %key, "action source removed");
                Some(source)
            }
            None => {
                tracing::warn!(key = %key, "no action source registered for key");
                None
            }
        }
    }

    pub fn contains_key(&self, key: impl Into<ActionKey>) -> bool {
        self.entries.borrow().contains_key(&key.into())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<ActionKey> {
        let mut keys: Vec<_> = self.entries.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Instance following whatever is registered under `key`.
    ///
    /// While nothing is registered its operations are ignored and its
    /// streams stay silent.
    pub fn source_for_key(&self, key: impl Into<ActionKey>) -> ActionInstance<T, O> {
        ActionInstance::new(KeyedSource {
            key: key.into(),
            entries: self.entries.clone(),
        })
    }

    /// Current store of every entry that has one
    fn stores(&self) -> Vec<ActionStore<T, O>> {
        // Release the map before calling into the sources
        let sources: Vec<SharedSource<T, O>> = self.entries.borrow().values().cloned().collect();
        sources
            .iter()
            .filter_map(|source| source.current_store())
            .collect()
    }

    /// Map each current store with `map` and fold the results with `reduce`.
    pub fn reduce_from_all_sources<M, R, FM, FR>(&self, init: R, map: FM, reduce: FR) -> R
    where
        FM: FnMut(&ActionStore<T, O>) -> M,
        FR: FnMut(R, M) -> R,
    {
        self.stores().iter().map(map).fold(init, reduce)
    }

    /// Whether any current store satisfies `predicate`; `default` when there
    /// are none.
    pub fn check_any<P>(&self, predicate: P, default: bool) -> bool
    where
        P: Fn(&ActionContextState<T, O>) -> bool,
    {
        let stores = self.stores();
        if stores.is_empty() {
            return default;
        }
        stores
            .iter()
            .any(|store| predicate(store.current_state().as_ref()))
    }

    /// Whether every current store satisfies `predicate`; `default` when
    /// there are none.
    pub fn check_all<P>(&self, predicate: P, default: bool) -> bool
    where
        P: Fn(&ActionContextState<T, O>) -> bool,
    {
        let stores = self.stores();
        if stores.is_empty() {
            return default;
        }
        stores
            .iter()
            .all(|store| predicate(store.current_state().as_ref()))
    }

    /// Reactive [`check_any`](Self::check_any): recomputed whenever an entry
    /// is added or removed, an entry switches store, or any store ticks.
    pub fn watch_any<P>(&self, predicate: P, default: bool) -> ActionStream<bool>
    where
        P: Fn(&ActionContextState<T, O>) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let snapshots = stream::boxed(WatchStream::new(self.entries.subscribe()));

        let combined = stream::switch_map(snapshots, None, move |entries: Entries<T, O>| {
            if entries.is_empty() {
                return stream::boxed(tokio_stream::once(default));
            }

            let mut flags = StreamMap::new();
            for (key, source) in entries {
                let predicate = predicate.clone();
                let entry_flags = stream::switch_map(source.store_changes(), None, move |store| {
                    let predicate = predicate.clone();
                    match store {
                        Some(store) => stream::boxed(
                            store
                                .state()
                                .map(move |state| Some((*predicate)(state.as_ref()))),
                        ),
                        None => stream::boxed(tokio_stream::once(None)),
                    }
                });
                flags.insert(key, entry_flags);
            }

            // Hold back until every entry has reported once
            let expected = flags.len();
            let mut latest: HashMap<ActionKey, Option<bool>> = HashMap::new();
            stream::boxed(flags.filter_map(move |(key, flag)| {
                latest.insert(key, flag);
                if latest.len() < expected {
                    return None;
                }
                let mut present = latest.values().flatten().peekable();
                if present.peek().is_none() {
                    return Some(default);
                }
                Some(present.any(|flag| *flag))
            }))
        });

        stream::distinct(combined)
    }
}

/// Source that follows one registry key.
struct KeyedSource<T, O> {
    key: ActionKey,
    entries: Arc<watch::Sender<Entries<T, O>>>,
}

impl<T: ActionValue, O: ActionValue> KeyedSource<T, O> {
    fn entry(&self) -> Option<SharedSource<T, O>> {
        self.entries.borrow().get(&self.key).cloned()
    }
}

impl<T: ActionValue, O: ActionValue> ActionStoreSource<T, O> for KeyedSource<T, O> {
    fn current_store(&self) -> Option<ActionStore<T, O>> {
        self.entry().and_then(|source| source.current_store())
    }

    fn store_changes(&self) -> ActionStream<Option<ActionStore<T, O>>> {
        let key = self.key.clone();
        let entries = WatchStream::new(self.entries.subscribe())
            .map(move |entries| entries.get(&key).cloned());
        let entry_changes = stream::distinct_by(entries, entry_id);

        let stores = stream::switch_map(entry_changes, None, |entry| match entry {
            Some(source) => source.store_changes(),
            None => stream::boxed(tokio_stream::once(None)),
        });
        stream::distinct_by(stores, |store: &Option<ActionStore<T, O>>| {
            store.as_ref().map(ActionStore::id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionStoreConfig;
    use crate::source::ActionStoreSlot;
    use crate::testing::StreamProbe;

    type Store = ActionStore<u32, u32>;
    type Registry = ActionRegistry<u32, u32>;

    fn store() -> Store {
        Store::with_config(ActionStoreConfig::new().quiet())
    }

    fn is_working(state: &ActionContextState<u32, u32>) -> bool {
        state.is_working()
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let registry = Registry::new();
        registry.add_store_source("save", store()).unwrap();

        let err = registry.add_store_source("save", store()).unwrap_err();
        assert_eq!(err, RegistryError::KeyAlreadyRegistered(ActionKey::new("save")));

        registry.remove_store_source("save").unwrap();
        registry.add_store_source("save", store()).unwrap();
    }

    #[test]
    fn test_remove_absent_key_is_not_an_error() {
        let registry = Registry::new();
        assert!(registry.remove_store_source("missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_check_any_and_all() {
        let registry = Registry::new();
        assert!(!registry.check_any(is_working, false));
        assert!(registry.check_all(is_working, true));

        let busy = store();
        let idle = store();
        busy.trigger();
        registry.add_store_source("busy", busy.clone()).unwrap();
        registry.add_store_source("idle", idle).unwrap();

        assert!(registry.check_any(is_working, false));
        assert!(!registry.check_all(is_working, true));

        busy.reset();
        assert!(!registry.check_any(is_working, true));
    }

    #[test]
    fn test_reduce_from_all_sources() {
        let registry = Registry::new();
        for (key, count) in [("a", 1), ("b", 2)] {
            let s = store();
            for _ in 0..count {
                s.trigger();
                s.reject(None);
            }
            registry.add_store_source(key, s).unwrap();
        }

        // entries without a store are skipped
        registry
            .add_store_source("empty", ActionStoreSlot::<u32, u32>::new())
            .unwrap();

        let total = registry.reduce_from_all_sources(
            0,
            |store| store.current_state().error_count(),
            |acc, n| acc + n,
        );
        assert_eq!(total, 3);
    }

    #[test]
    fn test_source_for_key_follows_registration() {
        let registry = Registry::new();
        let instance = registry.source_for_key("save");
        let mut working = StreamProbe::new(instance.is_working());
        assert!(working.drain().is_empty());
        assert!(!instance.trigger());

        let first = store();
        registry.add_store_source("save", first.clone()).unwrap();
        assert_eq!(working.drain(), vec![false]);

        assert!(instance.trigger());
        assert!(first.current_state().is_working());
        assert_eq!(working.drain(), vec![true]);

        registry.remove_store_source("save");
        assert!(instance.store().is_none());
        assert!(working.drain().is_empty());

        let second = store();
        registry.add_store_source("save", second).unwrap();
        assert_eq!(working.drain(), vec![false]);
    }

    #[test]
    fn test_watch_any() {
        let registry = Registry::new();
        let mut any = StreamProbe::new(registry.watch_any(is_working, false));
        assert_eq!(any.drain(), vec![false]);

        let a = store();
        let b = store();
        registry.add_store_source("a", a.clone()).unwrap();
        registry.add_store_source("b", b.clone()).unwrap();
        assert!(any.drain().is_empty());

        b.trigger();
        assert_eq!(any.drain(), vec![true]);

        a.trigger();
        b.resolve(None);
        assert!(any.drain().is_empty());

        a.reject(None);
        assert_eq!(any.drain(), vec![false]);

        a.trigger();
        assert_eq!(any.drain(), vec![true]);
        registry.remove_store_source("a");
        assert_eq!(any.drain(), vec![false]);
    }
}
