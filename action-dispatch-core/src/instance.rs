//! Facade over whichever store a source currently references
//!
//! An [`ActionInstance`] exposes every [`ActionStore`] operation and stream
//! without holding a concrete store. Operations apply to the store that is
//! current at call time and are ignored while there is none. Streams follow
//! the source: when the referenced store changes, each stream switches to the
//! new store's view of the same projection.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DEFAULT_DESTROY_TIMEOUT;
use crate::disabled::DisabledKeySet;
use crate::error::ReadableError;
use crate::lock::LockSet;
use crate::source::ActionStoreSource;
use crate::state::{
    ActionContextState, ActionState, ActionValue, LoadingState, LoadingStateType, RejectedPair,
    SuccessPair,
};
use crate::store::ActionStore;
use crate::stream::{self, ActionStream};

/// Source facade with its own teardown guard.
///
/// Clones share the source and the lock set.
pub struct ActionInstance<T, O> {
    source: Arc<dyn ActionStoreSource<T, O>>,
    lock_set: LockSet,
}

impl<T, O> Clone for ActionInstance<T, O> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            lock_set: self.lock_set.clone(),
        }
    }
}

impl<T: ActionValue, O: ActionValue> fmt::Debug for ActionInstance<T, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionInstance")
            .field("store", &self.store().map(|s| s.id()))
            .field("lock_set", &self.lock_set)
            .finish()
    }
}

impl<T: ActionValue, O: ActionValue> From<ActionStore<T, O>> for ActionInstance<T, O> {
    fn from(store: ActionStore<T, O>) -> Self {
        Self::new(store)
    }
}

impl<T: ActionValue, O: ActionValue> ActionInstance<T, O> {
    pub fn new<S>(source: S) -> Self
    where
        S: ActionStoreSource<T, O> + 'static,
    {
        Self::from_shared(Arc::new(source))
    }

    pub fn from_shared(source: Arc<dyn ActionStoreSource<T, O>>) -> Self {
        Self {
            source,
            lock_set: LockSet::new(),
        }
    }

    /// The store currently referenced, if any
    pub fn store(&self) -> Option<ActionStore<T, O>> {
        self.source.current_store()
    }

    /// The instance's own teardown guard (independent of the store's)
    pub fn lock_set(&self) -> &LockSet {
        &self.lock_set
    }

    pub fn current_state(&self) -> Option<Arc<ActionContextState<T, O>>> {
        self.store().map(|store| store.current_state())
    }

    pub fn epoch(&self) -> Option<u64> {
        self.store().map(|store| store.epoch())
    }

    /// Destroy the instance's lock set once it unlocks, forcing it after
    /// the default destroy timeout.
    pub fn destroy(&self) {
        self.destroy_with_timeout(Some(DEFAULT_DESTROY_TIMEOUT));
    }

    pub fn destroy_with_timeout(&self, timeout: Option<Duration>) {
        self.lock_set.destroy_on_next_unlock(timeout);
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock_set.is_destroyed()
    }

    fn apply(&self, op: &'static str, f: impl FnOnce(&ActionStore<T, O>) -> bool) -> bool {
        match self.store() {
            Some(store) => f(&store),
            None => {
                tracing::trace!(op, "no current store, op ignored");
                false
            }
        }
    }

    pub fn trigger(&self) -> bool {
        self.apply("Trigger", |s| s.trigger())
    }

    pub fn ready_value(&self, value: T) -> bool {
        self.apply("ReadyValue", |s| s.ready_value(value))
    }

    /// Trigger, then supply `value` to the same store.
    ///
    /// Returns whether the value was accepted.
    pub fn trigger_with_value(&self, value: T) -> bool {
        self.apply("TriggerWithValue", |s| {
            s.trigger();
            s.ready_value(value)
        })
    }

    pub fn start_working(&self) -> bool {
        self.apply("StartWorking", |s| s.start_working())
    }

    pub fn reject(&self, error: impl Into<Option<ReadableError>>) -> bool {
        self.apply("Reject", |s| s.reject(error))
    }

    pub fn resolve(&self, result: impl Into<Option<O>>) -> bool {
        self.apply("Resolve", |s| s.resolve(result))
    }

    pub fn reject_if_epoch(&self, epoch: u64, error: impl Into<Option<ReadableError>>) -> bool {
        self.apply("Reject", |s| s.reject_if_epoch(epoch, error))
    }

    pub fn resolve_if_epoch(&self, epoch: u64, result: impl Into<Option<O>>) -> bool {
        self.apply("Resolve", |s| s.resolve_if_epoch(epoch, result))
    }

    pub fn reset(&self) -> bool {
        self.apply("Reset", |s| s.reset())
    }

    pub fn enable(&self, key: Option<&str>) -> bool {
        self.apply("Enable", |s| s.enable(key))
    }

    pub fn disable(&self, key: Option<&str>) -> bool {
        self.apply("Disable", |s| s.disable(key))
    }

    pub fn set_is_modified(&self, is_modified: bool) -> bool {
        self.apply("SetIsModified", |s| s.set_is_modified(is_modified))
    }

    /// Follow `view` across store changes.
    ///
    /// The current store's stream is opened eagerly so that no tick is lost
    /// between creating the stream and first polling it.
    pub fn project<R, F>(&self, view: F) -> ActionStream<R>
    where
        R: Send + 'static,
        F: Fn(&ActionStore<T, O>) -> ActionStream<R> + Send + Sync + 'static,
    {
        let current = self.source.current_store();
        let initial = current.as_ref().map(&view);
        let seed = current.as_ref().map(ActionStore::id);

        let changes = stream::distinct_by_from(
            self.source.store_changes(),
            Some(seed),
            |store: &Option<ActionStore<T, O>>| store.as_ref().map(ActionStore::id),
        );

        let view = Box::new(view);
        stream::switch_map(changes, initial, move |store| match store {
            Some(store) => view(&store),
            None => stream::empty(),
        })
    }

    pub fn state(&self) -> ActionStream<Arc<ActionContextState<T, O>>> {
        self.project(|s| s.state())
    }

    pub fn action_state(&self) -> ActionStream<ActionState> {
        self.project(|s| s.action_state())
    }

    pub fn disabled_keys(&self) -> ActionStream<DisabledKeySet> {
        self.project(|s| s.disabled_keys())
    }

    pub fn is_disabled(&self) -> ActionStream<bool> {
        self.project(|s| s.is_disabled())
    }

    pub fn is_modified(&self) -> ActionStream<bool> {
        self.project(|s| s.is_modified())
    }

    pub fn error(&self) -> ActionStream<Option<ReadableError>> {
        self.project(|s| s.error())
    }

    pub fn triggered(&self) -> ActionStream<()> {
        self.project(|s| s.triggered())
    }

    pub fn value_ready(&self) -> ActionStream<T> {
        self.project(|s| s.value_ready())
    }

    pub fn working(&self) -> ActionStream<()> {
        self.project(|s| s.working())
    }

    pub fn rejected(&self) -> ActionStream<Option<ReadableError>> {
        self.project(|s| s.rejected())
    }

    pub fn success(&self) -> ActionStream<Option<O>> {
        self.project(|s| s.success())
    }

    pub fn success_pair(&self) -> ActionStream<SuccessPair<T, O>> {
        self.project(|s| s.success_pair())
    }

    pub fn rejected_pair(&self) -> ActionStream<RejectedPair<T>> {
        self.project(|s| s.rejected_pair())
    }

    pub fn is_working(&self) -> ActionStream<bool> {
        self.project(|s| s.is_working())
    }

    pub fn is_success(&self) -> ActionStream<bool> {
        self.project(|s| s.is_success())
    }

    pub fn is_idle(&self) -> ActionStream<bool> {
        self.project(|s| s.is_idle())
    }

    pub fn can_trigger(&self) -> ActionStream<bool> {
        self.project(|s| s.can_trigger())
    }

    pub fn is_modified_and_can_trigger(&self) -> ActionStream<bool> {
        self.project(|s| s.is_modified_and_can_trigger())
    }

    pub fn is_modified_and_can_trigger_updates(&self) -> ActionStream<bool> {
        self.project(|s| s.is_modified_and_can_trigger_updates())
    }

    pub fn loading_state(&self) -> ActionStream<LoadingState<O>> {
        self.project(|s| s.loading_state())
    }

    pub fn loading_state_type(&self) -> ActionStream<LoadingStateType> {
        self.project(|s| s.loading_state_type())
    }

    pub fn error_count_since_last_success(&self) -> ActionStream<u32> {
        self.project(|s| s.error_count_since_last_success())
    }
}

impl<T: ActionValue, O: ActionValue> ActionStoreSource<T, O> for ActionInstance<T, O> {
    fn current_store(&self) -> Option<ActionStore<T, O>> {
        self.source.current_store()
    }

    fn store_changes(&self) -> ActionStream<Option<ActionStore<T, O>>> {
        self.source.store_changes()
    }
}
