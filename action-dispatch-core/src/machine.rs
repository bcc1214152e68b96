//! Store, instance and executor wired together

use std::fmt;
use std::sync::Arc;

use tokio::task::AbortHandle;
use tokio_stream::StreamExt;

use crate::config::ActionStoreConfig;
use crate::executor::WorkExecutor;
use crate::instance::ActionInstance;
use crate::state::ActionValue;
use crate::store::ActionStore;

type SuccessCallback<O> = Arc<dyn Fn(Option<O>) + Send + Sync>;

/// Configuration for an [`ActionMachine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionMachineConfig {
    pub store: ActionStoreConfig,
    /// Destroy the machine after its first success
    pub one_time_use: bool,
    /// Drop outcomes of work whose cycle was reset or re-triggered
    pub guard_stale_results: bool,
}

impl ActionMachineConfig {
    pub fn one_time_use(mut self) -> Self {
        self.one_time_use = true;
        self
    }

    pub fn guard_stale_results(mut self) -> Self {
        self.guard_stale_results = true;
        self
    }

    pub fn with_store(mut self, store: ActionStoreConfig) -> Self {
        self.store = store;
        self
    }
}

/// An owned store, an instance over it and an executor bound to the
/// instance.
///
/// Register work through [`executor`](Self::executor), then call
/// [`start`](Self::start) from within a tokio runtime.
pub struct ActionMachine<T, O> {
    store: ActionStore<T, O>,
    instance: ActionInstance<T, O>,
    executor: WorkExecutor<T, O>,
    config: ActionMachineConfig,
    on_success: Option<SuccessCallback<O>>,
    watcher: Option<AbortHandle>,
}

impl<T: ActionValue, O: ActionValue> fmt::Debug for ActionMachine<T, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionMachine")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish()
    }
}

impl<T: ActionValue, O: ActionValue> Default for ActionMachine<T, O> {
    fn default() -> Self {
        Self::new(ActionMachineConfig::default())
    }
}

impl<T: ActionValue, O: ActionValue> ActionMachine<T, O> {
    pub fn new(config: ActionMachineConfig) -> Self {
        let store = ActionStore::with_config(config.store);
        let instance = ActionInstance::from(store.clone());
        let executor = WorkExecutor::new(instance.clone());
        executor.guard_stale_results(config.guard_stale_results);
        Self {
            store,
            instance,
            executor,
            config,
            on_success: None,
            watcher: None,
        }
    }

    /// Call `callback` with the result of every success
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<O>) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn store(&self) -> &ActionStore<T, O> {
        &self.store
    }

    pub fn instance(&self) -> &ActionInstance<T, O> {
        &self.instance
    }

    pub fn executor(&self) -> &WorkExecutor<T, O> {
        &self.executor
    }

    pub fn config(&self) -> &ActionMachineConfig {
        &self.config
    }

    /// Start the executor driver and the success watcher.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&mut self) {
        self.executor.spawn();

        if self.on_success.is_none() && !self.config.one_time_use {
            return;
        }

        let mut successes = self.instance.success();
        let callback = self.on_success.clone();
        let one_time_use = self.config.one_time_use;
        let store = self.store.clone();
        let instance = self.instance.clone();
        let handle = tokio::spawn(async move {
            while let Some(result) = successes.next().await {
                if let Some(callback) = callback.as_ref() {
                    callback(result);
                }
                if one_time_use {
                    tracing::debug!(store = store.id(), "one-time action succeeded, destroying");
                    instance.destroy();
                    store.destroy();
                    break;
                }
            }
        });

        if let Some(previous) = self.watcher.replace(handle.abort_handle()) {
            previous.abort();
        }
    }

    /// Destroy the instance and the store once their locks release
    pub fn destroy(&self) {
        self.instance.destroy();
        self.store.destroy();
    }
}

impl<T, O> Drop for ActionMachine<T, O> {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}
