//! Op logging with pattern-based filtering and in-memory history
//!
//! Provides configurable logging of store operations using glob patterns to
//! include/exclude ops by name. Supports tracing output and an in-memory
//! ring buffer of recent transitions for diagnostics.
//!
//! # Example
//!
//! ```ignore
//! use action_dispatch_core::logger::{OpLogConfig, OpLoggerConfig, OpLoggerMiddleware};
//!
//! // Log everything except SetIsModified (tracing only)
//! let middleware = OpLoggerMiddleware::new(OpLoggerConfig::default());
//!
//! // Keep the last 50 transitions in memory as well
//! let middleware = OpLoggerMiddleware::with_log(OpLogConfig::with_capacity(50));
//! let history = middleware.log().unwrap();
//! let store = ActionStore::with_middleware(ActionStoreConfig::default(), middleware);
//!
//! for entry in history.lock().recent(10) {
//!     println!("{} {} -> {:?}", entry.name, entry.from, entry.to);
//! }
//! ```

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::middleware::Middleware;
use crate::reducer::ActionOp;
use crate::state::{ActionContextState, ActionState};

/// Ops excluded by default: they fire on every keystroke of a bound form.
const DEFAULT_EXCLUDES: &[&str] = &["SetIsModified"];

/// Include/exclude filter over op names.
///
/// Patterns support `*` (any run of characters) and `?` (one character).
///
/// - `Re*` matches Reject, Resolve and Reset
/// - `*Working` matches StartWorking
#[derive(Debug, Clone)]
pub struct OpLoggerConfig {
    /// If non-empty, only log ops matching these patterns
    pub include_patterns: Vec<String>,
    /// Exclude ops matching these patterns (applied after include)
    pub exclude_patterns: Vec<String>,
}

impl Default for OpLoggerConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: default_excludes(),
        }
    }
}

fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

fn split_patterns(patterns: &str) -> Vec<String> {
    patterns
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

impl OpLoggerConfig {
    /// Build from comma-separated pattern lists.
    ///
    /// `None` for `include` logs everything; `None` for `exclude` keeps the
    /// default excludes.
    ///
    /// ```
    /// use action_dispatch_core::logger::OpLoggerConfig;
    ///
    /// let config = OpLoggerConfig::new(Some("Re*"), Some("Reset"));
    /// assert!(config.should_log("Reject"));
    /// assert!(!config.should_log("Reset"));
    /// assert!(!config.should_log("Trigger"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include_patterns: include.map(split_patterns).unwrap_or_default(),
            exclude_patterns: exclude.map(split_patterns).unwrap_or_else(default_excludes),
        }
    }

    /// Build from explicit pattern vectors
    pub fn with_patterns(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_patterns: include,
            exclude_patterns: exclude,
        }
    }

    /// Log every op
    pub fn all() -> Self {
        Self::with_patterns(Vec::new(), Vec::new())
    }

    /// Whether an op with this name passes the filter
    pub fn should_log(&self, op_name: &str) -> bool {
        let included = self.include_patterns.is_empty()
            || self
                .include_patterns
                .iter()
                .any(|p| glob_match(p, op_name));

        included && !self.exclude_patterns.iter().any(|p| glob_match(p, op_name))
    }
}

/// One recorded op
#[derive(Debug, Clone)]
pub struct OpLogEntry {
    /// Op name (from [`ActionOp::name`])
    pub name: &'static str,
    /// Debug rendering of the op
    pub summary: String,
    /// Computed state before the op
    pub from: ActionState,
    /// Computed state after the op, once known
    pub to: Option<ActionState>,
    /// Whether the op produced a new record, once known
    pub state_changed: Option<bool>,
    /// When the op was logged
    pub timestamp: Instant,
    /// Sequence number for ordering
    pub sequence: u64,
}

impl OpLogEntry {
    /// Time since the op was logged
    pub fn elapsed(&self) -> std::time::Duration {
        self.timestamp.elapsed()
    }
}

/// Configuration for the op history ring buffer
#[derive(Debug, Clone)]
pub struct OpLogConfig {
    /// Maximum number of entries kept
    pub capacity: usize,
    /// Which ops are recorded
    pub filter: OpLoggerConfig,
}

impl Default for OpLogConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            filter: OpLoggerConfig::default(),
        }
    }
}

impl OpLogConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn new(capacity: usize, filter: OpLoggerConfig) -> Self {
        Self { capacity, filter }
    }
}

/// In-memory ring buffer of recent ops
#[derive(Debug, Clone)]
pub struct OpLog {
    entries: VecDeque<OpLogEntry>,
    config: OpLogConfig,
    next_sequence: u64,
}

impl Default for OpLog {
    fn default() -> Self {
        Self::new(OpLogConfig::default())
    }
}

impl OpLog {
    pub fn new(config: OpLogConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity),
            config,
            next_sequence: 0,
        }
    }

    /// Record an op if it passes the filter.
    ///
    /// Returns whether it was recorded.
    pub fn record<T: Debug, O: Debug>(&mut self, op: &ActionOp<T, O>, from: ActionState) -> bool {
        let name = op.name();
        if !self.config.filter.should_log(name) {
            return false;
        }

        if self.entries.len() >= self.config.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(OpLogEntry {
            name,
            summary: format!("{op:?}"),
            from,
            to: None,
            state_changed: None,
            timestamp: Instant::now(),
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
        true
    }

    /// Fill in the outcome of the most recent entry
    pub fn complete_last(&mut self, to: ActionState, changed: bool) {
        if let Some(entry) = self.entries.back_mut() {
            entry.to = Some(to);
            entry.state_changed = Some(changed);
        }
    }

    /// Oldest first
    pub fn entries(&self) -> impl Iterator<Item = &OpLogEntry> {
        self.entries.iter()
    }

    /// Most recent `count` entries, newest first
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &OpLogEntry> {
        self.entries.iter().rev().take(count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn config(&self) -> &OpLogConfig {
        &self.config
    }
}

/// Shared handle to an [`OpLog`] owned by a middleware inside a store.
pub type SharedOpLog = Arc<Mutex<OpLog>>;

/// Middleware that logs ops with pattern filtering.
///
/// - **Tracing only** (default): logs via `tracing::debug!()`
/// - **With history**: also records into a shared [`OpLog`]
#[derive(Debug, Clone)]
pub struct OpLoggerMiddleware {
    config: OpLoggerConfig,
    log: Option<SharedOpLog>,
    last_op_recorded: bool,
    active: bool,
}

impl OpLoggerMiddleware {
    /// Tracing only
    pub fn new(config: OpLoggerConfig) -> Self {
        Self {
            config,
            log: None,
            last_op_recorded: false,
            active: true,
        }
    }

    /// Tracing plus an in-memory history
    pub fn with_log(config: OpLogConfig) -> Self {
        Self {
            config: config.filter.clone(),
            log: Some(Arc::new(Mutex::new(OpLog::new(config)))),
            last_op_recorded: false,
            active: true,
        }
    }

    /// Enable or disable the middleware.
    ///
    /// When inactive every hook is a no-op.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Handle to the history, if enabled
    pub fn log(&self) -> Option<SharedOpLog> {
        self.log.clone()
    }

    pub fn config(&self) -> &OpLoggerConfig {
        &self.config
    }
}

impl<T: Debug, O: Debug> Middleware<T, O> for OpLoggerMiddleware {
    fn before(&mut self, op: &ActionOp<T, O>, state: &ActionContextState<T, O>) {
        if !self.active {
            return;
        }

        let name = op.name();
        if self.config.should_log(name) {
            tracing::debug!(op = %name, from = %state.computed_action_state(), "action op");
        }

        self.last_op_recorded = match self.log {
            Some(ref log) => log.lock().record(op, state.computed_action_state()),
            None => false,
        };
    }

    fn after(&mut self, _op: &ActionOp<T, O>, state: &ActionContextState<T, O>, changed: bool) {
        if !self.active || !self.last_op_recorded {
            return;
        }
        if let Some(ref log) = self.log {
            log.lock()
                .complete_last(state.computed_action_state(), changed);
        }
    }
}

/// Glob match supporting `*` and `?`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // Position to resume from after the most recent `*`: (pattern, text)
    let mut backtrack: Option<(usize, usize)> = None;
    let (mut p, mut t) = (0, 0);

    while t < text.len() {
        match pattern.get(p).copied() {
            Some('*') => {
                backtrack = Some((p + 1, t));
                p += 1;
            }
            Some(c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((bp, bt)) => {
                    backtrack = Some((bp, bt + 1));
                    p = bp;
                    t = bt + 1;
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
