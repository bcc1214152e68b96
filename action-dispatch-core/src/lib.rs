//! Core types for action-dispatch
//!
//! This crate models one triggerable asynchronous action (a save button, a
//! form submit, a delete confirmation) as a small state machine with
//! observable derived views.
//!
//! # Core Concepts
//!
//! - **ActionStore**: the state machine; one record replaced on every op
//! - **DisabledKeySet**: independent disable reasons that combine via OR
//! - **LockSet**: named locks that defer teardown until work finishes
//! - **ActionInstance**: facade over whichever store a source references
//! - **ActionRegistry**: keyed sources with lookup and aggregate queries
//! - **WorkExecutor**: runs work for each ready value and settles the store
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──trigger──► Triggered ──ready_value──► ValueReady ──start_working──► Working
//!  ▲                                                                            │
//!  └───────────── trigger (from Resolved / Rejected) ◄── resolve / reject ◄─────┘
//! ```
//!
//! Illegal operations are silent no-ops. Streams replay the current value to
//! new subscribers and only yield when their projection changes.
//!
//! # Example
//!
//! ```ignore
//! use action_dispatch_core::prelude::*;
//!
//! let store = ActionStore::<String, u64>::new();
//! let instance = ActionInstance::from(store.clone());
//!
//! let mut executor = WorkExecutor::new(instance.clone());
//! executor.set_async_work(|draft: String| async move { save(draft).await });
//! executor.spawn();
//!
//! let mut working = instance.is_working();
//! instance.trigger_with_value("hello".into());
//! ```

pub mod config;
pub mod disabled;
pub mod error;
pub mod executor;
pub mod instance;
pub mod lock;
pub mod logger;
pub mod machine;
pub mod middleware;
pub mod reducer;
pub mod registry;
pub mod source;
pub mod state;
pub mod store;
pub mod stream;
pub mod testing;

pub use config::{ActionStoreConfig, DEFAULT_DESTROY_TIMEOUT};
pub use disabled::{disabled_key, DisabledKeySet, DEFAULT_DISABLED_KEY};
pub use error::{ReadableError, RegistryError, CANCELLED_ERROR_CODE, PANIC_ERROR_CODE};
pub use executor::{work_lock_key, WorkExecutor, WorkFuture, WorkResult, WORK_LOCK_KEY};
pub use instance::ActionInstance;
pub use lock::{LockGuard, LockKey, LockSet, UnlockOutcome};
pub use logger::{
    glob_match, OpLog, OpLogConfig, OpLogEntry, OpLoggerConfig, OpLoggerMiddleware, SharedOpLog,
};
pub use machine::{ActionMachine, ActionMachineConfig};
pub use middleware::{ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware};
pub use reducer::{reduce, ActionOp};
pub use registry::{ActionKey, ActionRegistry};
pub use source::{ActionStoreSlot, ActionStoreSource};
pub use state::{
    ActionContextState, ActionState, ActionValue, LoadingState, LoadingStateType, RejectedPair,
    SuccessPair,
};
pub use store::{ActionStore, WORKING_LOCK_KEY};
pub use stream::ActionStream;

// Testing exports
pub use testing::{settle, RecordingMiddleware, StreamProbe};

#[cfg(feature = "testing-time")]
pub use testing::{advance_time, pause_time, resume_time};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ActionStoreConfig;
    pub use crate::disabled::DisabledKeySet;
    pub use crate::error::{ReadableError, RegistryError};
    pub use crate::executor::WorkExecutor;
    pub use crate::instance::ActionInstance;
    pub use crate::lock::{LockGuard, LockSet, UnlockOutcome};
    pub use crate::logger::{OpLogConfig, OpLoggerConfig, OpLoggerMiddleware};
    pub use crate::machine::{ActionMachine, ActionMachineConfig};
    pub use crate::middleware::{ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware};
    pub use crate::reducer::ActionOp;
    pub use crate::registry::{ActionKey, ActionRegistry};
    pub use crate::source::{ActionStoreSlot, ActionStoreSource};
    pub use crate::state::{ActionContextState, ActionState, LoadingState, LoadingStateType};
    pub use crate::store::ActionStore;
    pub use crate::stream::ActionStream;
}
