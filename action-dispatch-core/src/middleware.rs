//! Middleware hooks around store operations

use crate::reducer::ActionOp;
use crate::state::ActionContextState;

/// Middleware trait for intercepting store operations
///
/// Implement this trait to add logging, auditing, or other cross-cutting
/// concerns to an [`ActionStore`](crate::ActionStore). Hooks run while the
/// store's commit lock is held, so they must not call back into the store.
pub trait Middleware<T, O>: Send {
    /// Called before the operation is reduced, with the current record
    fn before(&mut self, op: &ActionOp<T, O>, state: &ActionContextState<T, O>);

    /// Called after the operation is reduced, with the resulting record
    fn after(&mut self, op: &ActionOp<T, O>, state: &ActionContextState<T, O>, changed: bool);
}

impl<T, O, M> Middleware<T, O> for Box<M>
where
    M: Middleware<T, O> + ?Sized,
{
    fn before(&mut self, op: &ActionOp<T, O>, state: &ActionContextState<T, O>) {
        (**self).before(op, state);
    }

    fn after(&mut self, op: &ActionOp<T, O>, state: &ActionContextState<T, O>, changed: bool) {
        (**self).after(op, state, changed);
    }
}

/// A no-op middleware that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMiddleware;

impl<T, O> Middleware<T, O> for NoopMiddleware {
    fn before(&mut self, _op: &ActionOp<T, O>, _state: &ActionContextState<T, O>) {}
    fn after(&mut self, _op: &ActionOp<T, O>, _state: &ActionContextState<T, O>, _changed: bool) {}
}

/// Middleware that traces every operation
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    /// Whether to log before the reducer runs
    pub log_before: bool,
    /// Whether to log after the reducer runs
    pub log_after: bool,
    /// Label added to every event (usually the store id)
    pub label: Option<String>,
}

impl LoggingMiddleware {
    /// Log after only
    pub fn new() -> Self {
        Self {
            log_before: false,
            log_after: true,
            label: None,
        }
    }

    /// Log both before and after
    pub fn verbose() -> Self {
        Self {
            log_before: true,
            ..Self::new()
        }
    }

    /// Attach a label to every logged event
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("-")
    }
}

impl<T, O> Middleware<T, O> for LoggingMiddleware {
    fn before(&mut self, op: &ActionOp<T, O>, state: &ActionContextState<T, O>) {
        if self.log_before {
            tracing::debug!(
                store = %self.label(),
                op = %op.name(),
                from = %state.action_state,
                "Applying action op"
            );
        }
    }

    fn after(&mut self, op: &ActionOp<T, O>, state: &ActionContextState<T, O>, changed: bool) {
        if !self.log_after {
            return;
        }
        if changed {
            tracing::debug!(
                store = %self.label(),
                op = %op.name(),
                state = %state.computed_action_state(),
                "Action op applied"
            );
        } else {
            tracing::trace!(
                store = %self.label(),
                op = %op.name(),
                state = %state.computed_action_state(),
                "Action op ignored"
            );
        }
    }
}

/// Compose multiple middleware into a single middleware
pub struct ComposedMiddleware<T, O> {
    middlewares: Vec<Box<dyn Middleware<T, O>>>,
}

impl<T, O> std::fmt::Debug for ComposedMiddleware<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares_count", &self.middlewares.len())
            .finish()
    }
}

impl<T, O> Default for ComposedMiddleware<T, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, O> ComposedMiddleware<T, O> {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add a middleware to the composition
    pub fn add<M: Middleware<T, O> + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    /// Builder form of [`add`](Self::add)
    pub fn with<M: Middleware<T, O> + 'static>(mut self, middleware: M) -> Self {
        self.add(middleware);
        self
    }
}

impl<T, O> Middleware<T, O> for ComposedMiddleware<T, O> {
    fn before(&mut self, op: &ActionOp<T, O>, state: &ActionContextState<T, O>) {
        for middleware in &mut self.middlewares {
            middleware.before(op, state);
        }
    }

    fn after(&mut self, op: &ActionOp<T, O>, state: &ActionContextState<T, O>, changed: bool) {
        // Reverse order for proper nesting
        for middleware in self.middlewares.iter_mut().rev() {
            middleware.after(op, state, changed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    type Op = ActionOp<u32, u32>;
    type State = ActionContextState<u32, u32>;

    struct Recording {
        name: &'static str,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware<u32, u32> for Recording {
        fn before(&mut self, op: &Op, _state: &State) {
            self.events
                .lock()
                .push(format!("{}:before:{}", self.name, op.name()));
        }

        fn after(&mut self, op: &Op, _state: &State, changed: bool) {
            self.events
                .lock()
                .push(format!("{}:after:{}:{}", self.name, op.name(), changed));
        }
    }

    #[test]
    fn test_composed_middleware_nests() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut composed = ComposedMiddleware::new()
            .with(Recording {
                name: "a",
                events: events.clone(),
            })
            .with(Recording {
                name: "b",
                events: events.clone(),
            });

        let state = State::default();
        composed.before(&Op::Trigger, &state);
        composed.after(&Op::Trigger, &state, true);

        assert_eq!(
            *events.lock(),
            vec![
                "a:before:Trigger",
                "b:before:Trigger",
                "b:after:Trigger:true",
                "a:after:Trigger:true",
            ]
        );
    }

    #[test]
    fn test_logging_middleware_defaults() {
        let m = LoggingMiddleware::new();
        assert!(!m.log_before);
        assert!(m.log_after);

        let m = LoggingMiddleware::verbose().with_label("save");
        assert!(m.log_before);
        assert_eq!(m.label(), "save");
    }
}
