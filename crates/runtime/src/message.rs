//! Wire message envelopes.
//!
//! Three shapes ride a single JSON format: requests carry an `id` and a
//! target guid, responses carry the `id` back with exactly one of
//! `result`/`error`, and events carry a guid and method but no `id`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event method announcing a new remote object.
pub const CREATE_METHOD: &str = "__create__";

/// Event method retiring a remote object and its subtree.
pub const DISPOSE_METHOD: &str = "__dispose__";

/// Request message sent to the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Unique request ID for correlating the response.
    pub id: u32,
    /// GUID of the target object (empty string for the root).
    #[serde(
        serialize_with = "serialize_arc_str",
        deserialize_with = "deserialize_arc_str"
    )]
    pub guid: Arc<str>,
    /// Method name to invoke.
    pub method: String,
    /// Method parameters as a JSON object.
    pub params: Value,
}

/// Serde helpers for `Arc<str>` fields.
pub fn serialize_arc_str<S>(arc: &Arc<str>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(arc)
}

pub fn deserialize_arc_str<'de, D>(deserializer: D) -> std::result::Result<Arc<str>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    Ok(Arc::from(s.as_str()))
}

/// Response message from the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Request ID this response correlates to.
    pub id: u32,
    /// Success result (mutually exclusive with `error`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error result (mutually exclusive with `result`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorWrapper>,
}

/// Wrapper for the driver error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorWrapper {
    pub error: ErrorPayload,
}

/// Driver error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error message.
    pub message: String,
    /// Error type name (e.g., "TimeoutError").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Raw error value, used when no message is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Event message from the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// GUID of the object this event targets.
    #[serde(
        serialize_with = "serialize_arc_str",
        deserialize_with = "deserialize_arc_str"
    )]
    pub guid: Arc<str>,
    /// Event method name.
    pub method: String,
    /// Event parameters as a JSON object, `null` when omitted.
    #[serde(default)]
    pub params: Value,
}

/// Discriminated union of inbound messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// Response message (has an `id` field).
    Response(Response),
    /// Event message (no `id` field).
    Event(Event),
    /// Unknown message shape (forward-compatible catch-all).
    Unknown(Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_deserialization_response() {
        let json = r#"{"id": 42, "result": {"status": "ok"}}"#;
        let message: Message = serde_json::from_str(json).unwrap();

        match message {
            Message::Response(response) => {
                assert_eq!(response.id, 42);
                assert!(response.result.is_some());
                assert!(response.error.is_none());
            }
            _ => panic!("Expected Response"),
        }
    }

    #[test]
    fn test_message_deserialization_event() {
        let json = r#"{"guid": "page-1", "method": "console", "params": {"text": "hello"}}"#;
        let message: Message = serde_json::from_str(json).unwrap();

        match message {
            Message::Event(event) => {
                assert_eq!(event.guid.as_ref(), "page-1");
                assert_eq!(event.method, "console");
                assert_eq!(event.params["text"], "hello");
            }
            _ => panic!("Expected Event"),
        }
    }

    #[test]
    fn test_message_deserialization_error_response() {
        let json = r#"{"id": 7, "error": {"error": {"name": "TimeoutError", "message": "Timeout 3000ms exceeded"}}}"#;
        let message: Message = serde_json::from_str(json).unwrap();

        match message {
            Message::Response(response) => {
                let payload = response.error.expect("error payload").error;
                assert_eq!(payload.name.as_deref(), Some("TimeoutError"));
                assert_eq!(payload.message, "Timeout 3000ms exceeded");
            }
            _ => panic!("Expected Response"),
        }
    }

    #[test]
    fn test_request_serialization_shape() {
        let request = Request {
            id: 3,
            guid: Arc::from("page-1"),
            method: "navigate".to_string(),
            params: serde_json::json!({"url": "https://example.com"}),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["guid"], "page-1");
        assert_eq!(value["method"], "navigate");
        assert_eq!(value["params"]["url"], "https://example.com");
    }
}
