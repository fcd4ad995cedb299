//! Network domain types.
//!
//! Only the request-lifecycle events used for DOM settle tracking: the
//! engine counts in-flight requests, it does not inspect them.

use serde::Deserialize;

/// Unique request identifier.
pub type RequestId = String;

/// Event: Network.requestWillBeSent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWillBeSentEvent {
    /// Request identifier.
    pub request_id: RequestId,
    /// Loader identifier.
    pub loader_id: Option<String>,
    /// Requested URL.
    #[serde(default)]
    pub request: Option<RequestStub>,
}

/// URL-bearing fragment of the request object.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestStub {
    /// Request URL.
    pub url: String,
}

/// Event: Network.loadingFinished.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFinishedEvent {
    /// Request identifier.
    pub request_id: RequestId,
}

/// Event: Network.loadingFailed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFailedEvent {
    /// Request identifier.
    pub request_id: RequestId,
    /// Failure reason.
    pub error_text: Option<String>,
    /// Whether the request was canceled.
    pub canceled: Option<bool>,
}
