//! CDP wire-format types.
//!
//! The devtools protocol multiplexes three message shapes over one
//! WebSocket: outgoing requests, incoming responses keyed by request id,
//! and unsolicited events. Session-scoped traffic carries a `sessionId`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An outgoing CDP command.
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    /// Unique message ID for matching responses.
    pub id: u64,
    /// CDP method name (e.g., "DOM.getDocument").
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Session ID for target-scoped commands.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl CdpRequest {
    /// Build a request addressed to an optional session.
    pub fn new(id: u64, method: &str, params: Option<Value>, session_id: Option<&str>) -> Self {
        Self {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(ToString::to_string),
        }
    }
}

/// A response to a previously sent command.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpResponse {
    /// Message ID matching the request.
    pub id: u64,
    /// Result on success.
    pub result: Option<Value>,
    /// Error on failure.
    pub error: Option<CdpResponseError>,
    /// Session the response belongs to, if any.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Error details in a CDP response.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpResponseError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Additional error data.
    pub data: Option<String>,
}

/// An event pushed by the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpEvent {
    /// Event method name (e.g., "Page.frameAttached").
    pub method: String,
    /// Event parameters.
    pub params: Option<Value>,
    /// Session the event originated from, if any.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

impl CdpEvent {
    /// Whether this event was emitted by the given session.
    ///
    /// Events without a session id belong to the browser-level connection
    /// and match no session.
    pub fn is_from_session(&self, session_id: &str) -> bool {
        self.session_id.as_deref() == Some(session_id)
    }

    /// Deserialize the event parameters into a typed struct.
    ///
    /// Returns `None` when parameters are absent or do not match the
    /// expected shape; event consumers treat malformed events as noise.
    pub fn parse_params<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.params
            .as_ref()
            .and_then(|p| serde_json::from_value(p.clone()).ok())
    }
}

/// Any incoming CDP message.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CdpMessage {
    /// A response to a previous request.
    Response(CdpResponse),
    /// An event pushed by the browser.
    Event(CdpEvent),
}

#[cfg(test)]
mod tests;
