//! Composable set of disable reasons
//!
//! An action is disabled while at least one reason is present. Independent
//! features add their own reason keys, so each must be removed before the
//! action becomes triggerable again.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Reason key used when a caller disables or enables without naming one.
pub const DEFAULT_DISABLED_KEY: &str = "default";

/// Resolve an optional reason key to the key actually stored.
pub fn disabled_key(key: Option<&str>) -> &str {
    key.unwrap_or(DEFAULT_DISABLED_KEY)
}

/// Set of active disable reasons.
///
/// Operations return a new set instead of mutating in place so that a state
/// record holding the set can be replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisabledKeySet(BTreeSet<String>);

impl DisabledKeySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this set with `key` added.
    pub fn insert(&self, key: &str) -> Self {
        let mut keys = self.0.clone();
        keys.insert(key.to_string());
        Self(keys)
    }

    /// Return a copy of this set with `key` removed.
    pub fn remove(&self, key: &str) -> Self {
        let mut keys = self.0.clone();
        keys.remove(key);
        Self(keys)
    }

    /// Combine two sets of reasons (logical OR).
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Whether `key` is one of the active reasons.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    /// Disabled: at least one reason is present.
    pub fn is_true(&self) -> bool {
        !self.0.is_empty()
    }

    /// Enabled: no reason is present.
    pub fn is_false(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of active reasons.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Same as [`is_false`](Self::is_false).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the active reasons in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for DisabledKeySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
