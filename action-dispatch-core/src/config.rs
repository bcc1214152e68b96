//! Store configuration

use std::time::Duration;

/// How long a destroy request waits for outstanding locks before forcing
/// teardown.
pub const DEFAULT_DESTROY_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for an [`ActionStore`](crate::ActionStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionStoreConfig {
    /// Timeout applied to `destroy()`; `None` waits for the locks forever.
    pub destroy_timeout: Option<Duration>,
    /// Whether the default middleware traces every op.
    pub log_transitions: bool,
}

impl Default for ActionStoreConfig {
    fn default() -> Self {
        Self {
            destroy_timeout: Some(DEFAULT_DESTROY_TIMEOUT),
            log_transitions: true,
        }
    }
}

impl ActionStoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the destroy timeout (`None` disables the safeguard)
    pub fn with_destroy_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.destroy_timeout = timeout;
        self
    }

    /// Turn off transition tracing
    pub fn quiet(mut self) -> Self {
        self.log_transitions = false;
        self
    }
}
