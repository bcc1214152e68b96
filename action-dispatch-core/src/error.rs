//! Error types crossing the action boundary

use std::any::Any;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::ActionKey;

/// Error code used when work panics instead of returning an error.
pub const PANIC_ERROR_CODE: &str = "PANIC";

/// Error code used when spawned work is cancelled before it settles.
pub const CANCELLED_ERROR_CODE: &str = "CANCELLED";

/// A displayable error carried by a rejected action.
///
/// Work failures of any kind are normalized into this shape before they reach
/// [`ActionStore::reject`](crate::ActionStore::reject), so subscribers only
/// ever deal with one error type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ReadableError {
    /// Machine-readable error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message
    pub message: String,
    /// Arbitrary extra payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ReadableError {
    /// Create an error with a message and no code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            data: None,
        }
    }

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach a data payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Normalize any standard error.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        Self::new(err.to_string())
    }

    /// Normalize a panic payload caught from work.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "work panicked".to_string()
        };
        Self::new(message).with_code(PANIC_ERROR_CODE)
    }

    /// Normalize the failure of a spawned work task.
    pub fn from_join_error(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Self::from_panic(err.into_panic())
        } else {
            Self::new("work was cancelled before it settled").with_code(CANCELLED_ERROR_CODE)
        }
    }

    /// The code, if any.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl From<&str> for ReadableError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ReadableError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for ReadableError {
    fn from(err: serde_json::Error) -> Self {
        Self::from_error(&err).with_code("SERIALIZATION")
    }
}

/// Misuse of an [`ActionRegistry`](crate::ActionRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A source is already registered under this key
    #[error("an action source is already registered for key '{0}'")]
    KeyAlreadyRegistered(ActionKey),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readable_error_builders() {
        let err = ReadableError::new("save failed")
            .with_code("E_SAVE")
            .with_data(serde_json::json!({ "field": "name" }));

        assert_eq!(err.message, "save failed");
        assert_eq!(err.code(), Some("E_SAVE"));
        assert_eq!(err.to_string(), "save failed");
        assert_eq!(err.data, Some(serde_json::json!({ "field": "name" })));
    }

    #[test]
    fn test_readable_error_serde_shape() {
        let err = ReadableError::new("x");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "x" }));

        let parsed: ReadableError =
            serde_json::from_value(serde_json::json!({ "code": "E", "message": "y" })).unwrap();
        assert_eq!(parsed.code(), Some("E"));
        assert_eq!(parsed.data, None);
    }

    #[test]
    fn test_from_panic_payloads() {
        let err = ReadableError::from_panic(Box::new("boom"));
        assert_eq!(err.message, "boom");
        assert_eq!(err.code(), Some(PANIC_ERROR_CODE));

        let err = ReadableError::from_panic(Box::new(String::from("kaboom")));
        assert_eq!(err.message, "kaboom");

        let err = ReadableError::from_panic(Box::new(42u8));
        assert_eq!(err.message, "work panicked");
    }

    #[test]
    fn test_from_std_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = ReadableError::from_error(&io);
        assert_eq!(err.message, "disk full");
        assert_eq!(err.code, None);
    }

    #[test]
    fn test_registry_error_message() {
        let err = RegistryError::KeyAlreadyRegistered(ActionKey::new("save"));
        assert_eq!(
            err.to_string(),
            "an action source is already registered for key 'save'"
        );
    }
}
