//! Error types for the drover runtime.
//!
//! Driver-reported errors arrive as opaque `{name, message, value}` payloads
//! and are classified into a small closed taxonomy by
//! [`classify_driver_error`]. Callers pattern-match on the category *and* on
//! the literal message text, so classification preserves the original text
//! verbatim.

use serde_json::Value;
use thiserror::Error;

use crate::message::ErrorPayload;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the drover runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// The driver reported a timeout, or a local wait expired.
    #[error("{0}")]
    Timeout(String),

    /// The target object (browser, page, ...) is gone on the driver side.
    #[error("{0}")]
    TargetClosed(String),

    /// A navigation failed on the driver side.
    #[error("{0}")]
    Navigation(String),

    /// Any other driver-reported error, message verbatim.
    #[error("{0}")]
    Driver(String),

    /// The connection closed while the operation was in flight.
    #[error("Connection closed: {reason}")]
    ConnectionClosed { reason: String },

    /// Transport-level error (framing, pipe I/O).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol-level error (malformed or out-of-order messages).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Failed to launch the driver process.
    #[error("Failed to launch driver: {0}")]
    LaunchFailed(String),

    /// A `__create__` event carried a type tag with no registered constructor.
    #[error("Unknown remote object type: {0}")]
    UnknownObjectType(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// Returns true if this is a target-closed error.
    pub fn is_target_closed(&self) -> bool {
        matches!(self, Error::TargetClosed(_))
    }

    /// Returns true if this error was caused by the connection closing.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Error::ConnectionClosed { .. })
    }
}

/// Classifies a driver-reported error payload into the error taxonomy.
///
/// First match wins:
/// 1. `name == "TimeoutError"` -> [`Error::Timeout`]
/// 2. message contains `"Timeout"` and `"exceeded"` -> [`Error::Timeout`]
/// 3. message contains `"Target closed"` or `"page has been closed"` ->
///    [`Error::TargetClosed`]
/// 4. message contains `"Navigation failed because"` -> [`Error::Navigation`]
/// 5. otherwise -> [`Error::Driver`] with the message verbatim
///
/// A payload reaching the generic arm with an empty message falls back to
/// its raw `value` field.
pub fn classify_driver_error(payload: &ErrorPayload) -> Error {
    let message = &payload.message;

    if payload.name.as_deref() == Some("TimeoutError") {
        return Error::Timeout(message.clone());
    }

    if message.contains("Timeout") && message.contains("exceeded") {
        return Error::Timeout(message.clone());
    }

    if message.contains("Target closed") || message.contains("page has been closed") {
        return Error::TargetClosed(message.clone());
    }

    if message.contains("Navigation failed because") {
        return Error::Navigation(message.clone());
    }

    if message.is_empty() {
        return Error::Driver(payload.value.as_ref().map(render_value).unwrap_or_default());
    }

    Error::Driver(message.clone())
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(name: Option<&str>, message: &str) -> ErrorPayload {
        ErrorPayload {
            message: message.to_string(),
            name: name.map(str::to_string),
            value: None,
        }
    }

    #[test]
    fn test_classify_by_name() {
        let err = classify_driver_error(&payload(Some("TimeoutError"), "waiting for selector"));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "waiting for selector");
    }

    #[test]
    fn test_classify_timeout_by_message() {
        let err = classify_driver_error(&payload(None, "Timeout 3000ms exceeded"));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timeout 3000ms exceeded");
    }

    #[test]
    fn test_classify_target_closed() {
        let err = classify_driver_error(&payload(None, "Target closed"));
        assert!(err.is_target_closed());

        let err = classify_driver_error(&payload(None, "The page has been closed."));
        assert!(err.is_target_closed());
    }

    #[test]
    fn test_classify_navigation() {
        let err = classify_driver_error(&payload(None, "Navigation failed because net::ERR_FAILED"));
        assert!(matches!(err, Error::Navigation(_)));
        assert_eq!(err.to_string(), "Navigation failed because net::ERR_FAILED");
    }

    #[test]
    fn test_classify_generic_preserves_text() {
        let err = classify_driver_error(&payload(None, "boom"));
        match err {
            Error::Driver(message) => assert_eq!(message, "boom"),
            other => panic!("expected Driver error, got: {other:?}"),
        }
    }

    #[test]
    fn test_name_takes_priority_over_substrings() {
        // "Target closed" in the message, but the name wins.
        let err = classify_driver_error(&payload(Some("TimeoutError"), "Target closed"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_name_wins_even_with_empty_message() {
        let p = ErrorPayload {
            message: String::new(),
            name: Some("TimeoutError".to_string()),
            value: Some(serde_json::json!("something")),
        };
        let err = classify_driver_error(&p);
        assert!(err.is_timeout(), "got: {err:?}");
    }

    #[test]
    fn test_empty_message_falls_back_to_value() {
        let p = ErrorPayload {
            message: String::new(),
            name: None,
            value: Some(serde_json::json!("raw failure")),
        };
        let err = classify_driver_error(&p);
        assert_eq!(err.to_string(), "raw failure");
    }
}
