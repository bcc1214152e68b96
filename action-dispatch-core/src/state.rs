//! Action state record and its projections

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::disabled::DisabledKeySet;
use crate::error::ReadableError;

/// Marker trait for values carried by an action (input values and results).
///
/// Values are cloned into each new state record and compared for change
/// detection, and they travel across tasks:
/// - Clone + PartialEq: records are replaced wholesale and deduplicated
/// - Debug: for transition logging
/// - Send + Sync + 'static: records are shared with subscribers on any task
pub trait ActionValue: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {}

impl<T> ActionValue for T where T: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {}

/// Lifecycle position of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    /// Nothing is happening
    #[default]
    Idle,
    /// Idle, but at least one disable reason is present.
    ///
    /// Only ever reported by [`ActionContextState::computed_action_state`],
    /// never stored.
    Disabled,
    /// Triggered and waiting for a value
    Triggered,
    /// A value was supplied and is waiting to be worked on
    ValueReady,
    /// Work is in progress
    Working,
    /// The last cycle failed
    Rejected,
    /// The last cycle succeeded
    Resolved,
}

impl ActionState {
    /// Idle-terminal states: nothing is in flight and a new cycle may start.
    pub fn is_idle(self) -> bool {
        matches!(
            self,
            ActionState::Idle
                | ActionState::Disabled
                | ActionState::Rejected
                | ActionState::Resolved
        )
    }

    /// Whether a cycle is in flight.
    pub fn is_working(self) -> bool {
        !self.is_idle()
    }

    /// Stable name for logging.
    pub fn name(self) -> &'static str {
        match self {
            ActionState::Idle => "idle",
            ActionState::Disabled => "disabled",
            ActionState::Triggered => "triggered",
            ActionState::ValueReady => "value_ready",
            ActionState::Working => "working",
            ActionState::Rejected => "rejected",
            ActionState::Resolved => "resolved",
        }
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Three-way display projection of [`ActionState`] (plus idle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingStateType {
    Idle,
    Loading,
    Success,
    Error,
}

impl From<ActionState> for LoadingStateType {
    fn from(state: ActionState) -> Self {
        match state {
            ActionState::Idle | ActionState::Disabled => LoadingStateType::Idle,
            ActionState::Triggered | ActionState::ValueReady | ActionState::Working => {
                LoadingStateType::Loading
            }
            ActionState::Resolved => LoadingStateType::Success,
            ActionState::Rejected => LoadingStateType::Error,
        }
    }
}

/// Loading projection carrying the result or error.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadingState<O> {
    Idle,
    Loading,
    Success(Option<O>),
    Error(Option<ReadableError>),
}

impl<O> LoadingState<O> {
    /// The variant without its payload.
    pub fn state_type(&self) -> LoadingStateType {
        match self {
            LoadingState::Idle => LoadingStateType::Idle,
            LoadingState::Loading => LoadingStateType::Loading,
            LoadingState::Success(_) => LoadingStateType::Success,
            LoadingState::Error(_) => LoadingStateType::Error,
        }
    }
}

/// Value and result of a successful cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessPair<T, O> {
    pub value: Option<T>,
    pub result: Option<O>,
}

/// Value and error of a rejected cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedPair<T> {
    pub value: Option<T>,
    pub error: Option<ReadableError>,
}

/// The full state record of one action.
///
/// A store never mutates a record it has published; each effective operation
/// produces a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionContextState<T, O> {
    /// Raw lifecycle position (never [`ActionState::Disabled`])
    pub action_state: ActionState,
    /// The pending value differs from the last resolved one
    pub is_modified: bool,
    /// Input supplied by `ready_value`
    pub value: Option<T>,
    /// Output supplied by `resolve`
    pub result: Option<O>,
    /// Last rejection error
    pub error: Option<ReadableError>,
    /// Active disable reasons
    pub disabled: DisabledKeySet,
    /// Rejections since the last success
    pub error_count: Option<u32>,
}

impl<T, O> Default for ActionContextState<T, O> {
    fn default() -> Self {
        Self {
            action_state: ActionState::Idle,
            is_modified: false,
            value: None,
            result: None,
            error: None,
            disabled: DisabledKeySet::default(),
            error_count: None,
        }
    }
}

impl<T, O> ActionContextState<T, O> {
    /// The pristine record.
    pub fn pristine() -> Self {
        Self::default()
    }

    /// Whether any disable reason is present.
    pub fn is_disabled(&self) -> bool {
        self.disabled.is_true()
    }

    /// Raw state, with idle-terminal states reported as
    /// [`ActionState::Disabled`] while disabled.
    pub fn computed_action_state(&self) -> ActionState {
        if self.action_state.is_idle() && self.is_disabled() {
            ActionState::Disabled
        } else {
            self.action_state
        }
    }

    /// Whether `trigger` would take effect.
    pub fn can_trigger(&self) -> bool {
        !self.is_disabled() && self.action_state.is_idle()
    }

    /// Modified and triggerable.
    pub fn is_modified_and_can_trigger(&self) -> bool {
        self.is_modified && self.can_trigger()
    }

    pub fn is_working(&self) -> bool {
        self.action_state.is_working()
    }

    pub fn is_success(&self) -> bool {
        self.action_state == ActionState::Resolved
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.unwrap_or(0)
    }

    pub fn loading_state_type(&self) -> LoadingStateType {
        LoadingStateType::from(self.action_state)
    }
}

impl<T: Clone, O: Clone> ActionContextState<T, O> {
    /// Loading projection of this record.
    pub fn loading_state(&self) -> LoadingState<O> {
        match self.loading_state_type() {
            LoadingStateType::Idle => LoadingState::Idle,
            LoadingStateType::Loading => LoadingState::Loading,
            LoadingStateType::Success => LoadingState::Success(self.result.clone()),
            LoadingStateType::Error => LoadingState::Error(self.error.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type State = ActionContextState<u32, String>;

    #[test]
    fn test_idle_states() {
        assert!(ActionState::Idle.is_idle());
        assert!(ActionState::Disabled.is_idle());
        assert!(ActionState::Rejected.is_idle());
        assert!(ActionState::Resolved.is_idle());
        assert!(ActionState::Triggered.is_working());
        assert!(ActionState::ValueReady.is_working());
        assert!(ActionState::Working.is_working());
    }

    #[test]
    fn test_disabled_is_presentation_only() {
        let state = State {
            disabled: DisabledKeySet::new().insert("x"),
            ..State::default()
        };
        assert_eq!(state.action_state, ActionState::Idle);
        assert_eq!(state.computed_action_state(), ActionState::Disabled);
        assert!(!state.can_trigger());

        // a working record is reported as working even while disabled
        let working = State {
            action_state: ActionState::Working,
            ..state
        };
        assert_eq!(working.computed_action_state(), ActionState::Working);
    }

    #[test]
    fn test_loading_projection() {
        let mut state = State::default();
        assert_eq!(state.loading_state(), LoadingState::Idle);

        state.action_state = ActionState::ValueReady;
        assert_eq!(state.loading_state(), LoadingState::Loading);

        state.action_state = ActionState::Resolved;
        state.result = Some("ok".into());
        assert_eq!(state.loading_state(), LoadingState::Success(Some("ok".into())));

        state.action_state = ActionState::Rejected;
        state.error = Some(ReadableError::new("bad"));
        assert_eq!(
            state.loading_state().state_type(),
            LoadingStateType::Error
        );
    }

    #[test]
    fn test_modified_and_can_trigger() {
        let mut state = State::default();
        assert!(!state.is_modified_and_can_trigger());
        state.is_modified = true;
        assert!(state.is_modified_and_can_trigger());
        state.action_state = ActionState::Working;
        assert!(!state.is_modified_and_can_trigger());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_value(ActionState::ValueReady).unwrap();
        assert_eq!(json, serde_json::json!("value_ready"));
    }
}
