//! CDP error types.

use thiserror::Error;

/// Errors that can occur during CDP communication.
#[derive(Error, Debug)]
pub enum CdpError {
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket connection was lost during operation.
    #[error("WebSocket connection lost")]
    ConnectionLost,

    /// CDP protocol error returned by the browser.
    ///
    /// `method` is the command that failed; `message` is the browser's raw
    /// error text. Callers classify recoverability from the message.
    #[error("CDP error in {method}: {message}")]
    Protocol {
        method: String,
        code: i64,
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Command response timeout.
    #[error("{method} timed out after {timeout:?}")]
    Timeout {
        method: String,
        timeout: std::time::Duration,
    },

    /// Failed to parse an endpoint URL.
    #[error("invalid endpoint URL: {0}")]
    InvalidEndpointUrl(String),

    /// The HTTP discovery endpoint did not return a WebSocket URL.
    #[error("failed to get WebSocket debugger URL from endpoint")]
    NoDebuggerUrl,

    /// HTTP error during endpoint discovery.
    #[error("endpoint discovery failed: {0}")]
    Discovery(String),

    /// Session has been detached from its target.
    #[error("session detached: {0}")]
    SessionDetached(String),

    /// No dedicated target exists for the requested attach.
    #[error("no such target: {0}")]
    NoSuchTarget(String),

    /// The page target backing a session pool has closed.
    #[error("target closed")]
    TargetClosed,
}

impl CdpError {
    /// Whether this error indicates the remote node no longer exists.
    ///
    /// Chrome phrases this a few different ways depending on the domain
    /// entry point.
    pub fn is_node_gone(&self) -> bool {
        match self {
            Self::Protocol { message, .. } => {
                let msg = message.to_ascii_lowercase();
                msg.contains("no node with given id")
                    || msg.contains("node with given id does not belong to the document")
                    || msg.contains("could not find node with given id")
            }
            _ => false,
        }
    }

    /// Whether this error indicates the execution context or target went away
    /// mid-call, making a full capture retry worthwhile.
    pub fn is_context_lost(&self) -> bool {
        match self {
            Self::TargetClosed | Self::ConnectionLost => true,
            Self::SessionDetached(_) => true,
            Self::Protocol { message, .. } => {
                let msg = message.to_ascii_lowercase();
                msg.contains("execution context was destroyed")
                    || msg.contains("cannot find context with specified id")
                    || msg.contains("target closed")
                    || msg.contains("session with given id not found")
            }
            _ => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        match err {
            tokio_tungstenite::tungstenite::Error::ConnectionClosed
            | tokio_tungstenite::tungstenite::Error::AlreadyClosed => Self::ConnectionLost,
            other => Self::ConnectionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests;
