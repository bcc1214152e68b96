//! action-dispatch: state machines for triggerable async actions
//!
//! A save button, a form submit or a delete confirmation is one action with a
//! strict lifecycle. Stores track it, instances let UI code depend on
//! "whichever store is current", registries coordinate many of them, and the
//! executor runs the work.
//!
//! # Example
//! ```ignore
//! use action_dispatch::prelude::*;
//!
//! let registry = ActionRegistry::<String, u64>::new();
//! registry.add_store_source("save", ActionStore::new())?;
//!
//! let save = registry.source_for_key("save");
//! let mut executor = WorkExecutor::new(save.clone());
//! executor.set_value_fn(|draft: String| draft.len() as u64);
//! executor.spawn();
//!
//! save.trigger_with_value("hello".into());
//!
//! // Disable every other action while anything is working
//! let mut busy = registry.watch_any(|state| state.is_working(), false);
//! ```

// Re-export everything from core
pub use action_dispatch_core::*;

/// Prelude for convenient imports
pub mod prelude {
    // State machine
    pub use action_dispatch_core::{
        ActionContextState, ActionOp, ActionState, ActionStore, ActionStoreConfig, DisabledKeySet,
        LoadingState, LoadingStateType,
    };

    // Sources, instances and registries
    pub use action_dispatch_core::{
        ActionInstance, ActionKey, ActionRegistry, ActionStoreSlot, ActionStoreSource,
        ActionStream,
    };

    // Work and teardown
    pub use action_dispatch_core::{
        ActionMachine, ActionMachineConfig, LockGuard, LockSet, UnlockOutcome, WorkExecutor,
    };

    // Errors
    pub use action_dispatch_core::{ReadableError, RegistryError};

    // Middleware
    pub use action_dispatch_core::{
        ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware, OpLogConfig,
        OpLoggerConfig, OpLoggerMiddleware,
    };
}
