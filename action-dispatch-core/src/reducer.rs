//! Pure transition function of the action state machine
//!
//! [`reduce`] maps the current record and an [`ActionOp`] to the next record.
//! It returns `None` when the operation is not legal from the current state;
//! the store treats that as a silent no-op.

use crate::disabled::disabled_key;
use crate::error::ReadableError;
use crate::state::{ActionContextState, ActionState};

/// An operation applied to an action store.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOp<T, O> {
    /// Start a new cycle
    Trigger,
    /// Supply the input value for a triggered cycle
    ReadyValue(T),
    /// Mark the cycle as working
    StartWorking,
    /// Fail the cycle
    Reject(Option<ReadableError>),
    /// Complete the cycle
    Resolve(Option<O>),
    /// Return to the pristine record
    Reset,
    /// Add a disable reason (`None` = default reason)
    Disable(Option<String>),
    /// Remove a disable reason (`None` = default reason)
    Enable(Option<String>),
    /// Flag the pending value as modified
    SetIsModified(bool),
}

impl<T, O> ActionOp<T, O> {
    /// Operation name for logging and filtering.
    pub fn name(&self) -> &'static str {
        match self {
            ActionOp::Trigger => "Trigger",
            ActionOp::ReadyValue(_) => "ReadyValue",
            ActionOp::StartWorking => "StartWorking",
            ActionOp::Reject(_) => "Reject",
            ActionOp::Resolve(_) => "Resolve",
            ActionOp::Reset => "Reset",
            ActionOp::Disable(_) => "Disable",
            ActionOp::Enable(_) => "Enable",
            ActionOp::SetIsModified(_) => "SetIsModified",
        }
    }

    /// Whether a successful application starts a new epoch.
    pub(crate) fn starts_epoch(&self) -> bool {
        matches!(self, ActionOp::Trigger | ActionOp::Reset)
    }
}

/// Compute the record that follows `state` under `op`.
///
/// Returns `None` if `op` is illegal from `state`.
pub fn reduce<T: Clone, O: Clone>(
    state: &ActionContextState<T, O>,
    op: &ActionOp<T, O>,
) -> Option<ActionContextState<T, O>> {
    match op {
        ActionOp::Trigger => {
            if !state.can_trigger() {
                return None;
            }
            Some(ActionContextState {
                action_state: ActionState::Triggered,
                is_modified: state.is_modified,
                value: None,
                result: None,
                error: state.error.clone(),
                disabled: state.disabled.clone(),
                error_count: state.error_count,
            })
        }
        ActionOp::ReadyValue(value) => {
            if state.action_state != ActionState::Triggered {
                return None;
            }
            Some(ActionContextState {
                action_state: ActionState::ValueReady,
                value: Some(value.clone()),
                result: None,
                ..state.clone()
            })
        }
        ActionOp::StartWorking => Some(ActionContextState {
            action_state: ActionState::Working,
            ..state.clone()
        }),
        ActionOp::Reject(error) => Some(ActionContextState {
            action_state: ActionState::Rejected,
            is_modified: state.is_modified,
            value: None,
            result: None,
            error: error.clone(),
            disabled: state.disabled.clone(),
            error_count: Some(state.error_count() + 1),
        }),
        ActionOp::Resolve(result) => Some(ActionContextState {
            action_state: ActionState::Resolved,
            is_modified: false,
            value: state.value.clone(),
            result: result.clone(),
            error: None,
            disabled: state.disabled.clone(),
            error_count: None,
        }),
        ActionOp::Reset => Some(ActionContextState::pristine()),
        ActionOp::Disable(key) => Some(ActionContextState {
            disabled: state.disabled.insert(disabled_key(key.as_deref())),
            ..state.clone()
        }),
        ActionOp::Enable(key) => Some(ActionContextState {
            disabled: state.disabled.remove(disabled_key(key.as_deref())),
            ..state.clone()
        }),
        ActionOp::SetIsModified(is_modified) => Some(ActionContextState {
            is_modified: *is_modified,
            // a resolved result goes stale once the value changes again
            action_state: if state.action_state == ActionState::Resolved {
                ActionState::Idle
            } else {
                state.action_state
            },
            ..state.clone()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disabled::DEFAULT_DISABLED_KEY;

    type State = ActionContextState<u32, String>;
    type Op = ActionOp<u32, String>;

    fn apply(state: &State, op: Op) -> State {
        reduce(state, &op).unwrap_or_else(|| state.clone())
    }

    fn triggered() -> State {
        apply(&State::default(), Op::Trigger)
    }

    #[test]
    fn test_trigger_from_idle_terminal_states() {
        for start in [ActionState::Idle, ActionState::Rejected, ActionState::Resolved] {
            let state = State {
                action_state: start,
                value: Some(3),
                ..State::default()
            };
            let next = reduce(&state, &Op::Trigger).expect("trigger should apply");
            assert_eq!(next.action_state, ActionState::Triggered);
            assert_eq!(next.value, None);
        }
    }

    #[test]
    fn test_trigger_is_noop_while_disabled_or_busy() {
        let disabled = apply(&State::default(), Op::Disable(None));
        assert!(reduce(&disabled, &Op::Trigger).is_none());

        for busy in [ActionState::Triggered, ActionState::ValueReady, ActionState::Working] {
            let state = State {
                action_state: busy,
                ..State::default()
            };
            assert!(reduce(&state, &Op::Trigger).is_none());
        }
    }

    #[test]
    fn test_trigger_preserves_error_and_modified() {
        let state = State {
            action_state: ActionState::Rejected,
            is_modified: true,
            error: Some(ReadableError::new("x")),
            error_count: Some(1),
            ..State::default()
        };
        let next = apply(&state, Op::Trigger);
        assert!(next.is_modified);
        assert_eq!(next.error, Some(ReadableError::new("x")));
        assert_eq!(next.error_count, Some(1));
    }

    #[test]
    fn test_ready_value_only_from_triggered() {
        assert!(reduce(&State::default(), &Op::ReadyValue(5)).is_none());

        let next = apply(&triggered(), Op::ReadyValue(5));
        assert_eq!(next.action_state, ActionState::ValueReady);
        assert_eq!(next.value, Some(5));

        // a second value while ready is ignored
        assert!(reduce(&next, &Op::ReadyValue(6)).is_none());
    }

    #[test]
    fn test_resolve_clears_modified_and_error() {
        let state = State {
            action_state: ActionState::Working,
            is_modified: true,
            value: Some(5),
            error: Some(ReadableError::new("old")),
            error_count: Some(2),
            ..State::default()
        };
        let next = apply(&state, Op::Resolve(Some("done".into())));
        assert_eq!(next.action_state, ActionState::Resolved);
        assert!(!next.is_modified);
        assert_eq!(next.value, Some(5));
        assert_eq!(next.result.as_deref(), Some("done"));
        assert_eq!(next.error, None);
        assert_eq!(next.error_count(), 0);
    }

    #[test]
    fn test_reject_increments_and_preserves_disabled() {
        let state = apply(&State::default(), Op::Disable(Some("a".into())));
        let state = apply(&state, Op::Disable(Some("b".into())));
        let state = State {
            is_modified: true,
            value: Some(1),
            ..state
        };

        let next = apply(&state, Op::Reject(Some(ReadableError::new("x"))));
        assert_eq!(next.action_state, ActionState::Rejected);
        assert_eq!(next.error_count, Some(1));
        assert_eq!(next.value, None);
        assert!(next.is_modified);
        assert!(next.disabled.contains("a"));
        assert!(next.disabled.contains("b"));

        let next = apply(&next, Op::Reject(None));
        assert_eq!(next.error_count, Some(2));
        assert_eq!(next.error, None);
    }

    #[test]
    fn test_reset_is_pristine_and_idempotent() {
        let state = State {
            action_state: ActionState::Rejected,
            is_modified: true,
            error: Some(ReadableError::new("x")),
            disabled: crate::DisabledKeySet::new().insert("k"),
            error_count: Some(4),
            ..State::default()
        };
        let once = apply(&state, Op::Reset);
        let twice = apply(&once, Op::Reset);
        assert_eq!(once, State::pristine());
        assert_eq!(twice, State::pristine());
    }

    #[test]
    fn test_disable_never_changes_action_state() {
        let state = apply(&triggered(), Op::Disable(None));
        assert_eq!(state.action_state, ActionState::Triggered);
        assert!(state.disabled.contains(DEFAULT_DISABLED_KEY));

        let state = apply(&state, Op::Enable(None));
        assert_eq!(state.action_state, ActionState::Triggered);
        assert!(state.disabled.is_false());
    }

    #[test]
    fn test_set_is_modified_demotes_resolved() {
        let resolved = State {
            action_state: ActionState::Resolved,
            ..State::default()
        };
        let next = apply(&resolved, Op::SetIsModified(true));
        assert!(next.is_modified);
        assert_eq!(next.action_state, ActionState::Idle);

        let working = State {
            action_state: ActionState::Working,
            ..State::default()
        };
        let next = apply(&working, Op::SetIsModified(true));
        assert_eq!(next.action_state, ActionState::Working);
    }

    #[test]
    fn test_op_names() {
        assert_eq!(Op::Trigger.name(), "Trigger");
        assert_eq!(Op::ReadyValue(1).name(), "ReadyValue");
        assert_eq!(Op::SetIsModified(false).name(), "SetIsModified");
        assert!(Op::Reset.starts_epoch());
        assert!(!Op::StartWorking.starts_epoch());
    }
}
