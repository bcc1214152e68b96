//! Binds a unit of work to an action
//!
//! A [`WorkExecutor`] watches an [`ActionInstance`] for ready values, runs the
//! registered work with each one and feeds the outcome back as `resolve` or
//! `reject`. Work never raises into the caller: errors and panics become
//! rejections.
//!
//! # Example
//!
//! ```ignore
//! use action_dispatch_core::prelude::*;
//!
//! let store = ActionStore::<String, u64>::new();
//! let mut executor = WorkExecutor::new(ActionInstance::from(store.clone()));
//! executor.set_async_work(|name: String| async move {
//!     api::save(&name).await.map_err(|e| ReadableError::from_error(&e))
//! });
//! executor.spawn();
//!
//! store.trigger();
//! store.ready_value("draft".into());
//! ```

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_stream::StreamExt;

use crate::error::ReadableError;
use crate::instance::ActionInstance;
use crate::lock::LockKey;
use crate::state::ActionValue;

/// Prefix of the locks held on the instance's lock set while async work is
/// in flight.
///
/// Each run holds its own lock (see [`work_lock_key`]), so a destroy request
/// waits for every run still in flight, stale ones included.
pub const WORK_LOCK_KEY: &str = "work";

/// Lock key held by the `run`-th async run of an executor (counting from 1).
pub fn work_lock_key(run: u64) -> LockKey {
    LockKey::new(format!("{WORK_LOCK_KEY}:{run}"))
}

/// Outcome of a unit of work.
pub type WorkResult<O> = Result<Option<O>, ReadableError>;

/// Boxed future returned by async work.
pub type WorkFuture<O> = Pin<Box<dyn Future<Output = WorkResult<O>> + Send>>;

type SyncWork<T, O> = Arc<dyn Fn(T) -> WorkResult<O> + Send + Sync>;
type AsyncWork<T, O> = Arc<dyn Fn(T) -> WorkFuture<O> + Send + Sync>;

enum Work<T, O> {
    Sync(SyncWork<T, O>),
    Async(AsyncWork<T, O>),
}

impl<T, O> Clone for Work<T, O> {
    fn clone(&self) -> Self {
        match self {
            Work::Sync(f) => Work::Sync(f.clone()),
            Work::Async(f) => Work::Async(f.clone()),
        }
    }
}

struct Shared<T, O> {
    instance: ActionInstance<T, O>,
    work: Mutex<Option<Work<T, O>>>,
    guard_stale: AtomicBool,
    runs: AtomicU64,
}

impl<T: ActionValue, O: ActionValue> Shared<T, O> {
    fn handle_value(self: &Arc<Self>, value: T) -> Option<JoinHandle<()>> {
        // Snapshot so a later swap never affects this value
        let Some(work) = self.work.lock().clone() else {
            tracing::warn!(value = ?value, "value ready but no work registered");
            return None;
        };

        self.instance.start_working();
        let epoch = self.instance.epoch();

        match work {
            Work::Sync(f) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(value)))
                    .unwrap_or_else(|payload| Err(ReadableError::from_panic(payload)));
                self.settle(outcome, epoch);
                None
            }
            Work::Async(f) => {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    tracing::warn!("async work needs a tokio runtime");
                    self.settle(Err(ReadableError::new("no async runtime available")), epoch);
                    return None;
                };

                let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
                let guard = self.instance.lock_set().add_lock(work_lock_key(run));
                let future = match panic::catch_unwind(AssertUnwindSafe(|| f(value))) {
                    Ok(future) => future,
                    Err(payload) => {
                        self.settle(Err(ReadableError::from_panic(payload)), epoch);
                        drop(guard);
                        return None;
                    }
                };

                let shared = Arc::clone(self);
                Some(runtime.spawn(async move {
                    // A panic inside the work surfaces as a JoinError
                    let outcome = match tokio::spawn(future).await {
                        Ok(outcome) => outcome,
                        Err(err) => Err(ReadableError::from_join_error(err)),
                    };
                    shared.settle(outcome, epoch);
                    drop(guard);
                }))
            }
        }
    }

    fn settle(&self, outcome: WorkResult<O>, epoch: Option<u64>) {
        let guarded = epoch.filter(|_| self.guard_stale.load(Ordering::Relaxed));
        let applied = match (outcome, guarded) {
            (Ok(result), Some(epoch)) => self.instance.resolve_if_epoch(epoch, result),
            (Ok(result), None) => self.instance.resolve(result),
            (Err(error), Some(epoch)) => {
                tracing::debug!(error = %error, "work failed");
                self.instance.reject_if_epoch(epoch, error)
            }
            (Err(error), None) => {
                tracing::debug!(error = %error, "work failed");
                self.instance.reject(error)
            }
        };
        if !applied {
            tracing::trace!("work outcome not applied");
        }
    }
}

/// Runs registered work for each ready value of an [`ActionInstance`].
///
/// The driver started by [`spawn`](Self::spawn) is aborted when the executor
/// is dropped. Work already in flight still settles.
pub struct WorkExecutor<T, O> {
    shared: Arc<Shared<T, O>>,
    driver: Option<AbortHandle>,
}

impl<T, O> fmt::Debug for WorkExecutor<T, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let work = match *self.shared.work.lock() {
            Some(Work::Sync(_)) => "sync",
            Some(Work::Async(_)) => "async",
            None => "none",
        };
        f.debug_struct("WorkExecutor")
            .field("work", &work)
            .field("guard_stale", &self.shared.guard_stale.load(Ordering::Relaxed))
            .field("running", &self.driver.is_some())
            .finish()
    }
}

impl<T: ActionValue, O: ActionValue> WorkExecutor<T, O> {
    pub fn new(instance: ActionInstance<T, O>) -> Self {
        Self {
            shared: Arc::new(Shared {
                instance,
                work: Mutex::new(None),
                guard_stale: AtomicBool::new(false),
                runs: AtomicU64::new(0),
            }),
            driver: None,
        }
    }

    pub fn instance(&self) -> &ActionInstance<T, O> {
        &self.shared.instance
    }

    /// Register synchronous work
    pub fn set_work<F, E>(&self, work: F) -> &Self
    where
        F: Fn(T) -> Result<O, E> + Send + Sync + 'static,
        E: Into<ReadableError>,
    {
        let work: SyncWork<T, O> = Arc::new(move |value: T| -> WorkResult<O> {
            work(value).map(Some).map_err(Into::into)
        });
        *self.shared.work.lock() = Some(Work::Sync(work));
        self
    }

    /// Register asynchronous work
    pub fn set_async_work<F, Fut, E>(&self, work: F) -> &Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        E: Into<ReadableError> + 'static,
    {
        let work: AsyncWork<T, O> = Arc::new(move |value: T| -> WorkFuture<O> {
            let future = work(value);
            Box::pin(async move {
                let outcome: WorkResult<O> = future.await.map(Some).map_err(Into::into);
                outcome
            })
        });
        *self.shared.work.lock() = Some(Work::Async(work));
        self
    }

    /// Register a plain function producing the result
    pub fn set_value_fn<F>(&self, value_fn: F) -> &Self
    where
        F: Fn(T) -> O + Send + Sync + 'static,
    {
        let work: SyncWork<T, O> =
            Arc::new(move |value: T| -> WorkResult<O> { Ok(Some(value_fn(value))) });
        *self.shared.work.lock() = Some(Work::Sync(work));
        self
    }

    pub fn clear_work(&self) -> &Self {
        *self.shared.work.lock() = None;
        self
    }

    pub fn has_work(&self) -> bool {
        self.shared.work.lock().is_some()
    }

    /// Drop outcomes of work whose cycle was reset or re-triggered
    pub fn guard_stale_results(&self, guard: bool) -> &Self {
        self.shared.guard_stale.store(guard, Ordering::Relaxed);
        self
    }

    /// Run the current work with `value`.
    ///
    /// Synchronous work settles before this returns. Async work is spawned on
    /// the current runtime and its handle returned.
    pub fn handle_value(&self, value: T) -> Option<JoinHandle<()>> {
        self.shared.handle_value(value)
    }

    /// Start handling the instance's ready values on the current runtime.
    ///
    /// Calling it again replaces the previous driver.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(&mut self) -> &mut Self {
        let shared = self.shared.clone();
        let mut values = shared.instance.value_ready();
        let handle = tokio::spawn(async move {
            while let Some(value) = values.next().await {
                shared.handle_value(value);
            }
            tracing::trace!("ready value stream ended");
        });

        if let Some(previous) = self.driver.replace(handle.abort_handle()) {
            previous.abort();
        }
        self
    }

    pub fn is_running(&self) -> bool {
        self.driver.as_ref().is_some_and(|d| !d.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

impl<T, O> Drop for WorkExecutor<T, O> {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}
