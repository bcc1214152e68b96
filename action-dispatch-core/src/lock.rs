//! Reference-counted teardown guard
//!
//! A [`LockSet`] defers cleanup until every named lock it holds has been
//! released. Stores and instances use it so that an action which is still in
//! flight is not torn down underneath its work.
//!
//! # Example
//!
//! ```ignore
//! use action_dispatch_core::lock::LockSet;
//! use std::time::Duration;
//!
//! let locks = LockSet::new();
//! locks.on_destroy(|| println!("torn down"));
//!
//! let guard = locks.add_lock("upload");
//!
//! // Nothing happens yet: "upload" is still held
//! locks.destroy_on_next_unlock(Some(Duration::from_secs(2)));
//!
//! // Releasing the last lock runs the teardown
//! drop(guard);
//! assert!(locks.is_destroyed());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::stream::{self, ActionStream};

/// Identifies a lock within a [`LockSet`].
///
/// Adding a lock under a key that is already held replaces the previous
/// holder; the replaced guard's release becomes a no-op.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LockKey(String);

impl LockKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LockKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for LockKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How a deferred unlock callback was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Every lock was released
    Released,
    /// The timeout elapsed with locks still held
    TimedOut,
}

type UnlockCallback = Box<dyn FnOnce(UnlockOutcome) + Send>;
type DestroyCallback = Box<dyn FnOnce() + Send>;

struct PendingUnlock {
    id: u64,
    callback: UnlockCallback,
    timeout: Option<CancellationToken>,
}

#[derive(Default)]
struct Locks {
    held: HashMap<LockKey, u64>,
    pending: Vec<PendingUnlock>,
    on_destroy: Vec<DestroyCallback>,
    next_id: u64,
    destroyed: bool,
}

impl Locks {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn held_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.held.keys().map(|k| k.name().to_string()).collect();
        names.sort();
        names
    }
}

struct Shared {
    locks: Mutex<Locks>,
    locked: watch::Sender<bool>,
}

impl Shared {
    fn publish(&self, locks: &Locks) {
        let now = !locks.held.is_empty();
        self.locked.send_if_modified(|locked| {
            if *locked == now {
                return false;
            }
            *locked = now;
            true
        });
    }

    /// Release `key`; with `id`, only if that holder still owns it.
    fn release(&self, key: &LockKey, id: Option<u64>) -> bool {
        let ready = {
            let mut locks = self.locks.lock();
            match locks.held.get(key) {
                Some(&holder) if id.map_or(true, |id| id == holder) => {
                    locks.held.remove(key);
                }
                _ => return false,
            }
            self.publish(&locks);
            if locks.held.is_empty() {
                std::mem::take(&mut locks.pending)
            } else {
                Vec::new()
            }
        };

        tracing::trace!(lock = %key, "lock released");
        run_pending(ready, UnlockOutcome::Released);
        true
    }

    fn force_pending(&self, id: u64, timeout: Duration) {
        let (pending, held) = {
            let mut locks = self.locks.lock();
            let Some(pos) = locks.pending.iter().position(|p| p.id == id) else {
                return;
            };
            (locks.pending.remove(pos), locks.held_names())
        };

        tracing::warn!(
            locks = ?held,
            timeout_ms = timeout.as_millis() as u64,
            "lock set did not unlock in time, forcing"
        );
        (pending.callback)(UnlockOutcome::TimedOut);
    }

    fn destroy(&self, outcome: UnlockOutcome) {
        let callbacks = {
            let mut locks = self.locks.lock();
            if locks.destroyed {
                return;
            }
            locks.destroyed = true;
            std::mem::take(&mut locks.on_destroy)
        };

        tracing::debug!(
            forced = outcome == UnlockOutcome::TimedOut,
            "lock set destroyed"
        );
        for callback in callbacks {
            callback();
        }
    }
}

fn run_pending(pending: Vec<PendingUnlock>, outcome: UnlockOutcome) {
    for entry in pending {
        if let Some(token) = entry.timeout {
            token.cancel();
        }
        (entry.callback)(outcome);
    }
}

/// Reference-counted set of named locks with deferred teardown.
///
/// Cloning a `LockSet` yields another handle to the same set.
#[derive(Clone)]
pub struct LockSet {
    shared: Arc<Shared>,
}

impl Default for LockSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locks = self.shared.locks.lock();
        f.debug_struct("LockSet")
            .field("held", &locks.held_names())
            .field("pending", &locks.pending.len())
            .field("destroyed", &locks.destroyed)
            .finish()
    }
}

impl LockSet {
    pub fn new() -> Self {
        let (locked, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                locks: Mutex::new(Locks::default()),
                locked,
            }),
        }
    }

    /// Hold a named lock until the returned guard is released or dropped.
    pub fn add_lock(&self, key: impl Into<LockKey>) -> LockGuard {
        let key = key.into();
        let id = {
            let mut locks = self.shared.locks.lock();
            let id = locks.next_id();
            if locks.held.insert(key.clone(), id).is_some() {
                tracing::trace!(lock = %key, "lock holder replaced");
            }
            self.shared.publish(&locks);
            id
        };

        tracing::trace!(lock = %key, "lock added");
        LockGuard {
            shared: self.shared.clone(),
            key,
            id,
            released: false,
        }
    }

    /// Hold a named lock while the latest item of `locked` is `true`.
    ///
    /// The lock is released when the stream yields `false` or ends. The
    /// stream is driven on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn add_lock_until<S>(&self, key: impl Into<LockKey>, locked: S) -> JoinHandle<()>
    where
        S: Stream<Item = bool> + Send + 'static,
    {
        let key = key.into();
        let set = self.clone();
        tokio::spawn(async move {
            tokio::pin!(locked);
            let mut guard: Option<LockGuard> = None;
            while let Some(is_locked) = locked.next().await {
                if is_locked && guard.is_none() {
                    guard = Some(set.add_lock(key.clone()));
                } else if !is_locked {
                    guard = None;
                }
            }
        })
    }

    /// Keep this set locked while `child` is locked.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn add_child(&self, key: impl Into<LockKey>, child: &LockSet) -> JoinHandle<()> {
        self.add_lock_until(key, child.locked_changes())
    }

    /// Forcibly release a lock regardless of which guard holds it.
    pub fn remove_lock(&self, key: impl Into<LockKey>) -> bool {
        self.shared.release(&key.into(), None)
    }

    /// Whether any lock is held
    pub fn is_locked(&self) -> bool {
        !self.shared.locks.lock().held.is_empty()
    }

    /// Number of held locks
    pub fn lock_count(&self) -> usize {
        self.shared.locks.lock().held.len()
    }

    /// Whether `key` is held
    pub fn has_lock(&self, key: impl Into<LockKey>) -> bool {
        self.shared.locks.lock().held.contains_key(&key.into())
    }

    /// Current locked flag followed by every change to it
    pub fn locked_changes(&self) -> ActionStream<bool> {
        stream::boxed(WatchStream::new(self.shared.locked.subscribe()))
    }

    /// Run `callback` once no lock is held.
    ///
    /// Runs immediately when the set is already unlocked. With a `timeout`,
    /// the callback runs with [`UnlockOutcome::TimedOut`] if locks are still
    /// held when it elapses; the timeout needs a tokio runtime and is skipped
    /// (with a warning) without one.
    pub fn on_next_unlock<F>(&self, callback: F, timeout: Option<Duration>)
    where
        F: FnOnce(UnlockOutcome) + Send + 'static,
    {
        let mut locks = self.shared.locks.lock();
        if locks.held.is_empty() {
            drop(locks);
            callback(UnlockOutcome::Released);
            return;
        }

        let id = locks.next_id();
        let timeout = timeout.and_then(|duration| self.spawn_timeout(id, duration));
        locks.pending.push(PendingUnlock {
            id,
            callback: Box::new(callback),
            timeout,
        });
    }

    /// Destroy the set once no lock is held (or once `timeout` elapses).
    pub fn destroy_on_next_unlock(&self, timeout: Option<Duration>) {
        let shared = Arc::downgrade(&self.shared);
        self.on_next_unlock(
            move |outcome| {
                if let Some(shared) = shared.upgrade() {
                    shared.destroy(outcome);
                }
            },
            timeout,
        );
    }

    /// Destroy the set now, regardless of held locks.
    pub fn destroy(&self) {
        self.shared.destroy(UnlockOutcome::Released);
    }

    /// Register a teardown callback (runs immediately if already destroyed)
    pub fn on_destroy<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut locks = self.shared.locks.lock();
        if locks.destroyed {
            drop(locks);
            callback();
            return;
        }
        locks.on_destroy.push(Box::new(callback));
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.locks.lock().destroyed
    }

    fn spawn_timeout(&self, id: u64, duration: Duration) -> Option<CancellationToken> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                timeout_ms = duration.as_millis() as u64,
                "no tokio runtime, unlock timeout ignored"
            );
            return None;
        };

        // Measured from the request, not from the task's first poll
        let deadline = tokio::time::Instant::now() + duration;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        handle.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    if let Some(shared) = shared.upgrade() {
                        shared.force_pending(id, duration);
                    }
                }
            }
        });
        Some(token)
    }
}

/// A held lock; released on [`release`](LockGuard::release) or drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    shared: Arc<Shared>,
    key: LockKey,
    id: u64,
    released: bool,
}

impl LockGuard {
    pub fn key(&self) -> &LockKey {
        &self.key
    }

    /// Release the lock now
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.shared.release(&self.key, Some(self.id));
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish()
    }
}
