//! Sources of action stores
//!
//! Consumers that only need "whichever store is current" depend on an
//! [`ActionStoreSource`] instead of a concrete [`ActionStore`]. A source may
//! be a fixed store, a swappable [`ActionStoreSlot`], a registry entry, or an
//! [`ActionInstance`](crate::ActionInstance) wrapping any of those.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::state::ActionValue;
use crate::store::ActionStore;
use crate::stream::{self, ActionStream};

/// A reactive reference to an [`ActionStore`].
pub trait ActionStoreSource<T, O>: Send + Sync {
    /// The store currently referenced, if any
    fn current_store(&self) -> Option<ActionStore<T, O>>;

    /// The current store followed by every change of reference.
    ///
    /// May repeat the same store; consumers dedupe by [`ActionStore::id`].
    fn store_changes(&self) -> ActionStream<Option<ActionStore<T, O>>>;
}

impl<T: ActionValue, O: ActionValue> ActionStoreSource<T, O> for ActionStore<T, O> {
    fn current_store(&self) -> Option<ActionStore<T, O>> {
        Some(self.clone())
    }

    fn store_changes(&self) -> ActionStream<Option<ActionStore<T, O>>> {
        stream::boxed(tokio_stream::once(Some(self.clone())))
    }
}

impl<T, O, S> ActionStoreSource<T, O> for Arc<S>
where
    S: ActionStoreSource<T, O> + ?Sized,
{
    fn current_store(&self) -> Option<ActionStore<T, O>> {
        (**self).current_store()
    }

    fn store_changes(&self) -> ActionStream<Option<ActionStore<T, O>>> {
        (**self).store_changes()
    }
}

/// A swappable store reference.
///
/// Clones share the slot. Instances built on the slot switch their streams
/// to whatever store is placed in it.
pub struct ActionStoreSlot<T, O> {
    current: Arc<watch::Sender<Option<ActionStore<T, O>>>>,
}

impl<T, O> Clone for ActionStoreSlot<T, O> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
        }
    }
}

impl<T: ActionValue, O: ActionValue> Default for ActionStoreSlot<T, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ActionValue, O: ActionValue> std::fmt::Debug for ActionStoreSlot<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionStoreSlot")
            .field("store", &self.current.borrow().as_ref().map(ActionStore::id))
            .finish()
    }
}

impl<T: ActionValue, O: ActionValue> ActionStoreSlot<T, O> {
    /// An empty slot
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current: Arc::new(current),
        }
    }

    pub fn with_store(store: ActionStore<T, O>) -> Self {
        let slot = Self::new();
        slot.set(store);
        slot
    }

    /// Place `store` in the slot, returning the previous one
    pub fn set(&self, store: ActionStore<T, O>) -> Option<ActionStore<T, O>> {
        tracing::trace!(store = store.id(), "store slot set");
        self.current.send_replace(Some(store))
    }

    /// Empty the slot, returning the previous store
    pub fn clear(&self) -> Option<ActionStore<T, O>> {
        self.current.send_replace(None)
    }

    pub fn get(&self) -> Option<ActionStore<T, O>> {
        self.current.borrow().clone()
    }
}

impl<T: ActionValue, O: ActionValue> ActionStoreSource<T, O> for ActionStoreSlot<T, O> {
    fn current_store(&self) -> Option<ActionStore<T, O>> {
        self.get()
    }

    fn store_changes(&self) -> ActionStream<Option<ActionStore<T, O>>> {
        stream::boxed(WatchStream::new(self.current.subscribe()))
    }
}
