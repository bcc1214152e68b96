//! Test utilities for action stores and their streams
//!
//! - [`StreamProbe`]: drain whatever a stream has ready without a runtime
//! - [`settle`]: let spawned tasks run on the current runtime
//! - [`RecordingMiddleware`]: capture every op a store receives
//! - Assertion macros for drained items
//!
//! # Example
//!
//! ```ignore
//! use action_dispatch_core::prelude::*;
//! use action_dispatch_core::testing::StreamProbe;
//! use action_dispatch_core::assert_emitted;
//!
//! let store = ActionStore::<u32, u32>::new();
//! let mut states = StreamProbe::new(store.action_state());
//!
//! store.trigger();
//!
//! let states = states.drain();
//! assert_emitted!(states, ActionState::Triggered);
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use tokio_stream::Stream;

use crate::middleware::Middleware;
use crate::reducer::ActionOp;
use crate::state::ActionContextState;

/// Number of times [`settle`] yields to the scheduler.
const SETTLE_YIELDS: usize = 32;

/// Polls a stream with a no-op waker.
///
/// Every store stream delivers the ticks that are already buffered without
/// needing a runtime, so a probe can observe them synchronously right after
/// the operations that caused them.
pub struct StreamProbe<S> {
    stream: Pin<Box<S>>,
    finished: bool,
}

impl<S: Stream> StreamProbe<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Box::pin(stream),
            finished: false,
        }
    }

    /// Collect every item that is ready now.
    pub fn drain(&mut self) -> Vec<S::Item> {
        let mut items = Vec::new();
        let mut cx = Context::from_waker(Waker::noop());
        while !self.finished {
            match self.stream.as_mut().poll_next(&mut cx) {
                Poll::Ready(Some(item)) => items.push(item),
                Poll::Ready(None) => self.finished = true,
                Poll::Pending => break,
            }
        }
        items
    }

    /// The last item that is ready now, if any.
    pub fn last(&mut self) -> Option<S::Item> {
        self.drain().pop()
    }

    /// Whether the stream has ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Yield to the runtime until spawned tasks have had a chance to run.
pub async fn settle() {
    for _ in 0..SETTLE_YIELDS {
        tokio::task::yield_now().await;
    }
}

/// Middleware that records the name of every op and whether it applied.
#[derive(Debug, Clone, Default)]
pub struct RecordingMiddleware {
    ops: Arc<Mutex<Vec<(&'static str, bool)>>>,
}

impl RecordingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(op name, changed)` pairs, oldest first
    pub fn ops(&self) -> Vec<(&'static str, bool)> {
        self.ops.lock().clone()
    }

    /// Names of the ops that changed the record
    pub fn applied(&self) -> Vec<&'static str> {
        self.ops
            .lock()
            .iter()
            .filter(|(_, changed)| *changed)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn clear(&self) {
        self.ops.lock().clear();
    }
}

impl<T, O> Middleware<T, O> for RecordingMiddleware {
    fn before(&mut self, _op: &ActionOp<T, O>, _state: &ActionContextState<T, O>) {}

    fn after(&mut self, op: &ActionOp<T, O>, _state: &ActionContextState<T, O>, changed: bool) {
        self.ops.lock().push((op.name(), changed));
    }
}

/// Assert that some drained item matches a pattern.
///
/// # Example
///
/// ```ignore
/// let states = probe.drain();
/// assert_emitted!(states, ActionState::Working);
/// assert_emitted!(values, v if *v > 3);
/// ```
#[macro_export]
macro_rules! assert_emitted {
    ($items:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            $items.iter().any(|item| matches!(item, $pattern $(if $guard)?)),
            "Expected an item matching `{}`, but got: {:?}",
            stringify!($pattern),
            $items
        );
    };
}

/// Assert that no drained item matches a pattern.
#[macro_export]
macro_rules! assert_not_emitted {
    ($items:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            !$items.iter().any(|item| matches!(item, $pattern $(if $guard)?)),
            "Expected no item matching `{}`, but got: {:?}",
            stringify!($pattern),
            $items
        );
    };
}

/// Find the first drained item matching a pattern.
#[macro_export]
macro_rules! find_emitted {
    ($items:expr, $pattern:pat $(if $guard:expr)?) => {
        $items.iter().find(|item| matches!(item, $pattern $(if $guard)?))
    };
}

/// Count the drained items matching a pattern.
///
/// # Example
///
/// ```ignore
/// assert_eq!(count_emitted!(states, ActionState::Triggered), 1);
/// ```
#[macro_export]
macro_rules! count_emitted {
    ($items:expr, $pattern:pat $(if $guard:expr)?) => {
        $items
            .iter()
            .filter(|item| matches!(item, $pattern $(if $guard)?))
            .count()
    };
}

/// Pause tokio time for deterministic timeout tests.
#[cfg(feature = "testing-time")]
pub fn pause_time() {
    tokio::time::pause();
}

/// Resume tokio time after [`pause_time`].
#[cfg(feature = "testing-time")]
pub fn resume_time() {
    tokio::time::resume();
}

/// Advance paused tokio time.
#[cfg(feature = "testing-time")]
pub async fn advance_time(duration: std::time::Duration) {
    tokio::time::advance(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionStoreConfig;
    use crate::state::ActionState;
    use crate::store::ActionStore;

    #[test]
    fn test_probe_drains_ready_items() {
        let mut probe = StreamProbe::new(tokio_stream::iter(vec![1, 2, 3]));
        assert_eq!(probe.drain(), vec![1, 2, 3]);
        assert!(probe.is_finished());
        assert!(probe.drain().is_empty());
    }

    #[test]
    fn test_probe_last() {
        let mut probe = StreamProbe::new(tokio_stream::iter(vec!["a", "b"]));
        assert_eq!(probe.last(), Some("b"));
    }

    #[test]
    fn test_recording_middleware() {
        let recorder = RecordingMiddleware::new();
        let store = ActionStore::<u8, u8>::with_middleware(
            ActionStoreConfig::new().quiet(),
            recorder.clone(),
        );

        store.trigger();
        store.trigger();
        store.ready_value(1);

        assert_eq!(
            recorder.ops(),
            vec![("Trigger", true), ("Trigger", false), ("ReadyValue", true)]
        );
        assert_eq!(recorder.applied(), vec!["Trigger", "ReadyValue"]);
    }

    #[test]
    fn test_assertion_macros() {
        let states = vec![ActionState::Idle, ActionState::Triggered, ActionState::Triggered];
        assert_emitted!(states, ActionState::Triggered);
        assert_not_emitted!(states, ActionState::Working);
        assert_eq!(count_emitted!(states, ActionState::Triggered), 2);
        assert_eq!(find_emitted!(states, ActionState::Idle), Some(&ActionState::Idle));

        let values = vec![1, 5, 9];
        assert_emitted!(values, v if *v > 8);
    }
}
