//! The action state machine
//!
//! An [`ActionStore`] owns one [`ActionContextState`] record. Every operation
//! runs the pure [`reduce`](crate::reducer::reduce) function under the store's
//! commit lock, swaps in the new record and pushes it to every subscriber's
//! queue, so ticks are observed in the order operations were invoked and none
//! are dropped.
//!
//! # Example
//!
//! ```ignore
//! use action_dispatch_core::prelude::*;
//!
//! let store = ActionStore::<u32, String>::new();
//! let mut values = store.value_ready();
//!
//! store.trigger();
//! store.ready_value(5);
//! store.start_working();
//! store.resolve("saved".to_string());
//!
//! assert!(store.current_state().is_success());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::config::ActionStoreConfig;
use crate::disabled::DisabledKeySet;
use crate::error::ReadableError;
use crate::lock::{LockGuard, LockSet};
use crate::middleware::{ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware};
use crate::reducer::{self, ActionOp};
use crate::state::{
    ActionContextState, ActionState, ActionValue, LoadingState, LoadingStateType, RejectedPair,
    SuccessPair,
};
use crate::stream::{self, ActionStream};

/// Lock held in the store's [`LockSet`] while a cycle is in flight.
pub const WORKING_LOCK_KEY: &str = "working";

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

type Record<T, O> = Arc<ActionContextState<T, O>>;

struct Core<T, O> {
    state: Record<T, O>,
    epoch: u64,
    middleware: Box<dyn Middleware<T, O>>,
    /// Subscriber queues; `None` once destroyed
    observers: Option<Vec<mpsc::UnboundedSender<Record<T, O>>>>,
    working: Option<LockGuard>,
}

impl<T, O> Core<T, O> {
    fn is_destroyed(&self) -> bool {
        self.observers.is_none()
    }

    /// Push `state` to every live subscriber and forget the closed ones.
    fn publish(&mut self, state: &Record<T, O>) {
        if let Some(observers) = self.observers.as_mut() {
            observers.retain(|tx| tx.send(state.clone()).is_ok());
        }
    }
}

struct StoreInner<T, O> {
    id: u64,
    config: ActionStoreConfig,
    core: Mutex<Core<T, O>>,
    lock_set: LockSet,
}

impl<T, O> StoreInner<T, O> {
    fn teardown(&self) {
        let working = {
            let mut core = self.core.lock();
            // Dropping the senders ends every subscriber stream
            core.observers = None;
            core.working.take()
        };
        drop(working);
        tracing::debug!(store = self.id, "action store destroyed");
    }
}

/// State machine for one triggerable asynchronous action.
///
/// Cloning an `ActionStore` yields another handle to the same store.
pub struct ActionStore<T, O> {
    inner: Arc<StoreInner<T, O>>,
}

impl<T, O> Clone for ActionStore<T, O> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ActionValue, O: ActionValue> fmt::Debug for ActionStore<T, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("ActionStore")
            .field("id", &self.inner.id)
            .field("epoch", &core.epoch)
            .field("state", &core.state)
            .field("destroyed", &core.is_destroyed())
            .finish()
    }
}

impl<T: ActionValue, O: ActionValue> Default for ActionStore<T, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ActionValue, O: ActionValue> ActionStore<T, O> {
    /// Create a store with the default configuration
    pub fn new() -> Self {
        Self::with_config(ActionStoreConfig::default())
    }

    pub fn with_config(config: ActionStoreConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a store whose operations pass through `middleware`.
    ///
    /// Transition logging (when enabled in `config`) runs outside of
    /// `middleware`.
    pub fn with_middleware<M>(config: ActionStoreConfig, middleware: M) -> Self
    where
        M: Middleware<T, O> + 'static,
    {
        Self::build(config, Some(Box::new(middleware)))
    }

    fn build(config: ActionStoreConfig, extra: Option<Box<dyn Middleware<T, O>>>) -> Self {
        let id = NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed);
        let logging = config
            .log_transitions
            .then(|| LoggingMiddleware::new().with_label(format!("store-{id}")));

        let middleware: Box<dyn Middleware<T, O>> = match (logging, extra) {
            (Some(logging), Some(extra)) => {
                let mut composed = ComposedMiddleware::new().with(logging);
                composed.add(extra);
                Box::new(composed)
            }
            (Some(logging), None) => Box::new(logging),
            (None, Some(extra)) => extra,
            (None, None) => Box::new(NoopMiddleware),
        };

        let inner = Arc::new(StoreInner {
            id,
            config,
            core: Mutex::new(Core {
                state: Arc::new(ActionContextState::pristine()),
                epoch: 0,
                middleware,
                observers: Some(Vec::new()),
                working: None,
            }),
            lock_set: LockSet::new(),
        });

        let weak: Weak<StoreInner<T, O>> = Arc::downgrade(&inner);
        inner.lock_set.on_destroy(move || {
            if let Some(inner) = weak.upgrade() {
                inner.teardown();
            }
        });

        tracing::trace!(store = id, "action store created");
        Self { inner }
    }

    /// Process-unique identity of this store
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &ActionStoreConfig {
        &self.inner.config
    }

    /// Whether both handles refer to the same store
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Latest record
    pub fn current_state(&self) -> Record<T, O> {
        self.inner.core.lock().state.clone()
    }

    /// Cycle counter; advances on every successful `trigger` and every
    /// effective `reset`.
    pub fn epoch(&self) -> u64 {
        self.inner.core.lock().epoch
    }

    /// The store's teardown guard
    pub fn lock_set(&self) -> &LockSet {
        &self.inner.lock_set
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.core.lock().is_destroyed()
    }

    // ---------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------

    /// Apply `op`. Returns whether the record changed.
    pub fn dispatch(&self, op: ActionOp<T, O>) -> bool {
        self.commit(op, None)
    }

    pub fn trigger(&self) -> bool {
        self.dispatch(ActionOp::Trigger)
    }

    pub fn ready_value(&self, value: T) -> bool {
        self.dispatch(ActionOp::ReadyValue(value))
    }

    pub fn start_working(&self) -> bool {
        self.dispatch(ActionOp::StartWorking)
    }

    pub fn reject(&self, error: impl Into<Option<ReadableError>>) -> bool {
        self.dispatch(ActionOp::Reject(error.into()))
    }

    pub fn resolve(&self, result: impl Into<Option<O>>) -> bool {
        self.dispatch(ActionOp::Resolve(result.into()))
    }

    /// Reject only if no new cycle started since `epoch`
    pub fn reject_if_epoch(&self, epoch: u64, error: impl Into<Option<ReadableError>>) -> bool {
        self.commit(ActionOp::Reject(error.into()), Some(epoch))
    }

    /// Resolve only if no new cycle started since `epoch`
    pub fn resolve_if_epoch(&self, epoch: u64, result: impl Into<Option<O>>) -> bool {
        self.commit(ActionOp::Resolve(result.into()), Some(epoch))
    }

    pub fn reset(&self) -> bool {
        self.dispatch(ActionOp::Reset)
    }

    /// Add a disable reason (`None` for the default reason)
    pub fn disable(&self, key: Option<&str>) -> bool {
        self.dispatch(ActionOp::Disable(key.map(str::to_string)))
    }

    /// Remove a disable reason (`None` for the default reason)
    pub fn enable(&self, key: Option<&str>) -> bool {
        self.dispatch(ActionOp::Enable(key.map(str::to_string)))
    }

    pub fn set_is_modified(&self, is_modified: bool) -> bool {
        self.dispatch(ActionOp::SetIsModified(is_modified))
    }

    /// Tear the store down once its lock set fully unlocks.
    ///
    /// Teardown is forced after the configured destroy timeout. After
    /// teardown every operation is a no-op and every stream ends.
    pub fn destroy(&self) {
        tracing::debug!(
            store = self.inner.id,
            locks = self.inner.lock_set.lock_count(),
            "action store destroy requested"
        );
        self.inner
            .lock_set
            .destroy_on_next_unlock(self.inner.config.destroy_timeout);
    }

    fn commit(&self, op: ActionOp<T, O>, expected_epoch: Option<u64>) -> bool {
        let (changed, released) = {
            let mut guard = self.inner.core.lock();
            let core = &mut *guard;

            if core.is_destroyed() {
                tracing::trace!(
                    store = self.inner.id,
                    op = op.name(),
                    "store destroyed, op ignored"
                );
                return false;
            }
            if let Some(expected) = expected_epoch {
                if expected != core.epoch {
                    tracing::debug!(
                        store = self.inner.id,
                        op = op.name(),
                        expected,
                        epoch = core.epoch,
                        "stale outcome ignored"
                    );
                    return false;
                }
            }

            core.middleware.before(&op, &core.state);

            let current = core.state.as_ref();
            let next = reducer::reduce(current, &op).filter(|next| next != current);
            let changed = match next {
                Some(next) => {
                    let next = Arc::new(next);
                    core.publish(&next);
                    core.state = next;
                    if op.starts_epoch() {
                        core.epoch += 1;
                    }
                    true
                }
                None => false,
            };

            core.middleware.after(&op, &core.state, changed);

            let released = match (core.state.is_working(), core.working.is_some()) {
                (true, false) => {
                    core.working = Some(self.inner.lock_set.add_lock(WORKING_LOCK_KEY));
                    None
                }
                (false, true) => core.working.take(),
                _ => None,
            };
            (changed, released)
        };

        // Releasing may run teardown callbacks that re-enter the store
        drop(released);
        changed
    }

    // ---------------------------------------------------------------------
    // Streams
    // ---------------------------------------------------------------------

    /// Current record followed by every change.
    ///
    /// Each subscriber owns an unbounded queue filled under the commit lock,
    /// so a slow subscriber sees every tick in order. The stream ends when
    /// the store is destroyed.
    pub fn state(&self) -> ActionStream<Record<T, O>> {
        let mut core = self.inner.core.lock();
        let current = core.state.clone();
        let Some(observers) = core.observers.as_mut() else {
            return stream::boxed(tokio_stream::once(current));
        };
        let (tx, rx) = mpsc::unbounded_channel();
        observers.push(tx);
        drop(core);

        stream::boxed(tokio_stream::once(current).chain(UnboundedReceiverStream::new(rx)))
    }

    fn view<K, F>(&self, mut project: F) -> ActionStream<K>
    where
        K: PartialEq + Clone + Send + 'static,
        F: FnMut(&ActionContextState<T, O>) -> K + Send + 'static,
    {
        stream::distinct(self.state().map(move |state| project(state.as_ref())))
    }

    /// Records that entered `target`, once per transition.
    fn entered(&self, target: ActionState) -> ActionStream<Record<T, O>> {
        let entries = stream::distinct_by(self.state(), |state| state.action_state);
        stream::boxed(entries.filter(move |state| state.action_state == target))
    }

    /// Reported state, with [`ActionState::Disabled`] overriding idle states
    pub fn action_state(&self) -> ActionStream<ActionState> {
        self.view(|state| state.computed_action_state())
    }

    pub fn disabled_keys(&self) -> ActionStream<DisabledKeySet> {
        self.view(|state| state.disabled.clone())
    }

    pub fn is_disabled(&self) -> ActionStream<bool> {
        self.view(|state| state.is_disabled())
    }

    pub fn is_modified(&self) -> ActionStream<bool> {
        self.view(|state| state.is_modified)
    }

    pub fn error(&self) -> ActionStream<Option<ReadableError>> {
        self.view(|state| state.error.clone())
    }

    pub fn triggered(&self) -> ActionStream<()> {
        stream::boxed(self.entered(ActionState::Triggered).map(|_| ()))
    }

    /// Each value supplied to a triggered cycle
    pub fn value_ready(&self) -> ActionStream<T> {
        stream::boxed(
            self.entered(ActionState::ValueReady)
                .filter_map(|state| state.value.clone()),
        )
    }

    pub fn working(&self) -> ActionStream<()> {
        stream::boxed(self.entered(ActionState::Working).map(|_| ()))
    }

    /// Error of each rejection
    pub fn rejected(&self) -> ActionStream<Option<ReadableError>> {
        stream::boxed(
            self.entered(ActionState::Rejected)
                .map(|state| state.error.clone()),
        )
    }

    /// Result of each success
    pub fn success(&self) -> ActionStream<Option<O>> {
        stream::boxed(
            self.entered(ActionState::Resolved)
                .map(|state| state.result.clone()),
        )
    }

    pub fn success_pair(&self) -> ActionStream<SuccessPair<T, O>> {
        stream::boxed(self.entered(ActionState::Resolved).map(|state| SuccessPair {
            value: state.value.clone(),
            result: state.result.clone(),
        }))
    }

    /// Error of each rejection with the value the cycle was working on.
    ///
    /// A rejected record no longer carries its value, so the value is taken
    /// from the tick before the rejection.
    pub fn rejected_pair(&self) -> ActionStream<RejectedPair<T>> {
        let mut last_state: Option<ActionState> = None;
        let mut last_value: Option<T> = None;
        stream::boxed(self.state().filter_map(move |state| {
            let entered = state.action_state == ActionState::Rejected
                && last_state != Some(ActionState::Rejected);
            let value = std::mem::replace(&mut last_value, state.value.clone());
            last_state = Some(state.action_state);
            entered.then(|| RejectedPair {
                value,
                error: state.error.clone(),
            })
        }))
    }

    /// True while a cycle is in flight
    pub fn is_working(&self) -> ActionStream<bool> {
        self.view(|state| state.is_working())
    }

    pub fn is_success(&self) -> ActionStream<bool> {
        self.view(|state| state.is_success())
    }

    pub fn is_idle(&self) -> ActionStream<bool> {
        self.view(|state| state.action_state.is_idle())
    }

    pub fn can_trigger(&self) -> ActionStream<bool> {
        self.view(|state| state.can_trigger())
    }

    pub fn is_modified_and_can_trigger(&self) -> ActionStream<bool> {
        self.view(|state| state.is_modified_and_can_trigger())
    }

    /// Like [`is_modified_and_can_trigger`](Self::is_modified_and_can_trigger)
    /// but yields on every tick, repeated values included.
    pub fn is_modified_and_can_trigger_updates(&self) -> ActionStream<bool> {
        stream::boxed(
            self.state()
                .map(|state| state.is_modified_and_can_trigger()),
        )
    }

    pub fn loading_state_type(&self) -> ActionStream<LoadingStateType> {
        self.view(|state| state.loading_state_type())
    }

    /// Loading projection, recomputed when its variant changes
    pub fn loading_state(&self) -> ActionStream<LoadingState<O>> {
        let changes = stream::distinct_by(self.state(), |state| state.loading_state_type());
        stream::boxed(changes.map(|state| state.loading_state()))
    }

    /// Rejections since the success flag last flipped
    pub fn error_count_since_last_success(&self) -> ActionStream<u32> {
        let mut last_success: Option<bool> = None;
        let mut last_state: Option<ActionState> = None;
        let mut count = 0u32;
        let counts = self.state().map(move |state| {
            let success = state.is_success();
            if last_success != Some(success) {
                last_success = Some(success);
                count = 0;
            }
            if state.action_state == ActionState::Rejected
                && last_state != Some(ActionState::Rejected)
            {
                count += 1;
            }
            last_state = Some(state.action_state);
            count
        });
        stream::distinct(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{OpLogConfig, OpLoggerConfig, OpLoggerMiddleware};
    use crate::testing::StreamProbe;

    type Store = ActionStore<u32, u32>;

    fn quiet() -> Store {
        Store::with_config(ActionStoreConfig::new().quiet())
    }

    #[test]
    fn test_successful_cycle_emits_in_order() {
        let store = quiet();
        let mut triggered = StreamProbe::new(store.triggered());
        let mut values = StreamProbe::new(store.value_ready());
        let mut working = StreamProbe::new(store.is_working());
        let mut success = StreamProbe::new(store.success());

        assert_eq!(working.drain(), vec![false]);

        assert!(store.trigger());
        assert_eq!(triggered.drain(), vec![()]);
        assert_eq!(working.drain(), vec![true]);

        assert!(store.ready_value(5));
        assert_eq!(values.drain(), vec![5]);

        store.start_working();
        assert!(store.resolve(10));
        assert_eq!(success.drain(), vec![Some(10)]);
        assert_eq!(working.drain(), vec![false]);
        assert!(!store.current_state().is_modified);
    }

    #[test]
    fn test_rejected_cycle() {
        let store = quiet();
        store.set_is_modified(true);
        let mut rejected = StreamProbe::new(store.rejected());
        let mut pairs = StreamProbe::new(store.rejected_pair());

        store.trigger();
        store.ready_value(5);
        store.reject(ReadableError::new("x"));

        assert_eq!(rejected.drain(), vec![Some(ReadableError::new("x"))]);
        assert_eq!(
            pairs.drain(),
            vec![RejectedPair {
                value: Some(5),
                error: Some(ReadableError::new("x")),
            }]
        );
        let state = store.current_state();
        assert_eq!(state.error_count(), 1);
        assert!(state.is_modified);
    }

    #[test]
    fn test_slow_subscriber_sees_every_cycle() {
        let store = quiet();
        let mut success = StreamProbe::new(store.success());
        let mut values = StreamProbe::new(store.value_ready());
        assert!(success.drain().is_empty());
        assert!(values.drain().is_empty());

        for i in 0..200 {
            store.trigger();
            store.ready_value(i);
            store.start_working();
            store.resolve(i * 2);
        }

        let results = success.drain();
        assert_eq!(results.len(), 200);
        assert_eq!(results.last(), Some(&Some(398)));
        assert_eq!(values.drain(), (0..200u32).collect::<Vec<_>>());
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let store = quiet();
        let states = store.state();
        let mut kept = StreamProbe::new(store.action_state());
        drop(states);

        store.trigger();
        assert_eq!(store.inner.core.lock().observers.as_ref().map(Vec::len), Some(1));
        assert_eq!(kept.drain(), vec![ActionState::Idle, ActionState::Triggered]);
    }

    #[test]
    fn test_noop_calls_do_not_refire_entry_streams() {
        let store = quiet();
        let mut triggered = StreamProbe::new(store.triggered());
        let mut values = StreamProbe::new(store.value_ready());

        // ready_value from idle is ignored
        assert!(!store.ready_value(1));
        assert!(values.drain().is_empty());

        store.trigger();
        assert!(!store.trigger());
        assert_eq!(triggered.drain(), vec![()]);

        store.ready_value(2);
        assert!(!store.ready_value(3));
        assert_eq!(values.drain(), vec![2]);
        assert_eq!(store.current_state().value, Some(2));
    }

    #[test]
    fn test_disable_keys_compose() {
        let store = quiet();
        let mut disabled = StreamProbe::new(store.is_disabled());
        let mut states = StreamProbe::new(store.action_state());

        store.disable(Some("a"));
        store.disable(Some("b"));
        store.enable(Some("a"));
        assert!(!store.trigger());

        store.enable(Some("b"));
        assert_eq!(disabled.drain(), vec![false, true, false]);
        assert_eq!(
            states.drain(),
            vec![ActionState::Idle, ActionState::Disabled, ActionState::Idle]
        );
        assert!(store.trigger());
    }

    #[test]
    fn test_late_subscriber_gets_current_value() {
        let store = quiet();
        store.trigger();
        store.ready_value(7);

        let mut values = StreamProbe::new(store.value_ready());
        assert_eq!(values.drain(), vec![7]);

        let mut states = StreamProbe::new(store.state());
        let first = states.drain();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].action_state, ActionState::ValueReady);
    }

    #[test]
    fn test_error_count_since_last_success() {
        let store = quiet();
        let mut counts = StreamProbe::new(store.error_count_since_last_success());

        for _ in 0..2 {
            store.trigger();
            store.reject(None);
        }
        assert_eq!(counts.drain(), vec![0, 1, 2]);

        store.trigger();
        store.resolve(1);
        assert_eq!(counts.drain(), vec![0]);

        store.trigger();
        store.reject(None);
        assert_eq!(counts.drain(), vec![1]);
    }

    #[test]
    fn test_loading_state_projection() {
        let store = quiet();
        let mut loading = StreamProbe::new(store.loading_state());

        store.trigger();
        store.ready_value(1);
        store.start_working();
        store.resolve(9);

        assert_eq!(
            loading.drain(),
            vec![
                LoadingState::Idle,
                LoadingState::Loading,
                LoadingState::Success(Some(9)),
            ]
        );
    }

    #[test]
    fn test_modified_and_can_trigger_updates_every_tick() {
        let store = quiet();
        let mut distinct = StreamProbe::new(store.is_modified_and_can_trigger());
        let mut updates = StreamProbe::new(store.is_modified_and_can_trigger_updates());

        store.set_is_modified(true);
        store.disable(Some("k"));
        store.disable(Some("j"));

        assert_eq!(distinct.drain(), vec![false, true, false]);
        assert_eq!(updates.drain(), vec![false, true, false, false]);
    }

    #[test]
    fn test_working_lock_follows_cycle() {
        let store = quiet();
        assert!(!store.lock_set().is_locked());

        store.trigger();
        assert!(store.lock_set().has_lock(WORKING_LOCK_KEY));

        store.resolve(1);
        assert!(!store.lock_set().is_locked());
    }

    #[test]
    fn test_destroy_waits_for_cycle() {
        let store = Store::with_config(ActionStoreConfig::new().quiet().with_destroy_timeout(None));
        let mut states = StreamProbe::new(store.state());
        states.drain();

        store.trigger();
        store.destroy();
        assert!(!store.is_destroyed());

        store.resolve(3);
        assert!(store.is_destroyed());
        assert!(!store.trigger());

        // the resolve tick is delivered before the stream ends
        let last = states.drain();
        assert_eq!(last.len(), 2);
        assert!(states.is_finished());
    }

    #[test]
    fn test_destroy_when_idle_is_immediate() {
        let store = quiet();
        let mut states = StreamProbe::new(store.action_state());
        store.destroy();

        assert!(store.is_destroyed());
        assert_eq!(states.drain(), vec![ActionState::Idle]);
        assert!(states.is_finished());
    }

    #[test]
    fn test_epoch_guard() {
        let store = quiet();
        assert_eq!(store.epoch(), 0);

        store.trigger();
        let first = store.epoch();
        store.ready_value(1);
        store.start_working();

        // a reset starts a new epoch, so the stale outcome is dropped
        store.reset();
        assert!(!store.resolve_if_epoch(first, 1));
        assert_eq!(store.current_state().action_state, ActionState::Idle);

        store.trigger();
        let second = store.epoch();
        assert!(second > first);
        assert!(store.reject_if_epoch(second, ReadableError::new("late")));

        // resetting a pristine record is not a new epoch
        store.reset();
        let epoch = store.epoch();
        store.reset();
        assert_eq!(store.epoch(), epoch);
    }

    #[test]
    fn test_stale_outcome_lands_without_guard() {
        let store = quiet();
        store.trigger();
        store.ready_value(1);
        store.reset();

        assert!(store.resolve(5));
        assert_eq!(store.current_state().result, Some(5));
    }

    #[test]
    fn test_middleware_records_ops() {
        let logger = OpLoggerMiddleware::with_log(OpLogConfig::new(10, OpLoggerConfig::all()));
        let log = logger.log().expect("history enabled");
        let store = Store::with_middleware(ActionStoreConfig::default(), logger);

        store.trigger();
        store.trigger();

        let log = log.lock();
        let changed: Vec<_> = log.entries().map(|e| e.state_changed).collect();
        assert_eq!(changed, vec![Some(true), Some(false)]);
    }

    #[test]
    fn test_success_pair_keeps_value() {
        let store = quiet();
        let mut pairs = StreamProbe::new(store.success_pair());
        store.trigger();
        store.ready_value(4);
        store.resolve(8);
        assert_eq!(
            pairs.drain(),
            vec![SuccessPair {
                value: Some(4),
                result: Some(8),
            }]
        );
    }
}
