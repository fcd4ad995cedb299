//! Engine error types.

use std::time::Duration;
use thiserror::Error;

use lookout_cdp::CdpError;

/// Errors that can occur in the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// CDP communication error.
    #[error("CDP error: {0}")]
    Cdp(#[from] CdpError),

    /// Frame graph error.
    #[error("frame graph error: {0}")]
    FrameGraph(#[from] FrameGraphError),

    /// Capture error.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Element resolution error.
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Action dispatch error.
    #[error("action error: {0}")]
    Action(#[from] ActionError),

    /// Language model error.
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),
}

/// Errors related to frame graph maintenance.
#[derive(Error, Debug)]
pub enum FrameGraphError {
    /// A frame index or frame id was not present in the graph.
    #[error("unknown frame: {0}")]
    UnknownFrame(String),

    /// CDP error while talking to the browser.
    #[error("CDP error: {0}")]
    Cdp(#[from] CdpError),
}

/// Errors related to snapshot capture.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The capture failed on the root session and every retry was spent.
    #[error("capture failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: CdpError,
    },

    /// CDP error outside the retryable class.
    #[error("CDP error: {0}")]
    Cdp(#[from] CdpError),

    /// Frame graph error during capture.
    #[error("frame graph error: {0}")]
    FrameGraph(#[from] FrameGraphError),
}

/// Errors resolving an encoded id to a live node.
///
/// The variants distinguish the failure classes callers react to:
/// `BadRequest` is never retried, `FrameNotReady` and `StaleElement` can
/// be cured by re-observing.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The encoded id is malformed or references data the snapshot does
    /// not carry.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The frame index or element is not known to the graph/snapshot.
    #[error("not found: {0}")]
    NotFound(String),

    /// The frame has no execution context after waiting.
    #[error("frame not ready: {0}")]
    FrameNotReady(String),

    /// The element is gone and XPath recovery found no replacement.
    #[error("stale element: {0}")]
    StaleElement(String),

    /// CDP error outside the recoverable class.
    #[error("CDP error: {0}")]
    Cdp(#[from] CdpError),
}

/// Errors dispatching an action.
#[derive(Error, Debug)]
pub enum ActionError {
    /// The method/argument pair does not parse into the closed action set.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Element resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The action exceeded its budget.
    #[error("{method} timed out after {budget:?}")]
    Timeout { method: String, budget: Duration },

    /// The element has no layout or refused interaction.
    #[error("element not interactable: {0}")]
    NotInteractable(String),

    /// CDP error during dispatch.
    #[error("CDP error: {0}")]
    Cdp(#[from] CdpError),
}

impl ActionError {
    /// Whether this failure is action-local: reported as `{ok: false}`
    /// to the caller rather than surfaced as a hard error.
    pub fn is_action_local(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::NotInteractable(_)
                | Self::Resolve(ResolveError::StaleElement(_) | ResolveError::FrameNotReady(_))
        )
    }
}

/// Errors from the language-model boundary.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The provider reported a failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// No structured output after the attempt budget.
    #[error("no structured output after {attempts} attempts")]
    NoStructuredOutput { attempts: u32 },

    /// Structured output arrived but did not match the expected shape.
    #[error("invalid reply: {0}")]
    InvalidReply(String),
}

#[cfg(test)]
mod tests;
