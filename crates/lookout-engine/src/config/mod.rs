//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Engine-wide tuning knobs.
///
/// The defaults are the budgets the engine is specified against; override
/// them only when the target environment is unusually slow.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Full-capture retry budget for root-session failures.
    pub capture_retries: u32,
    /// Snapshot cache age ceiling.
    pub snapshot_ttl: Duration,
    /// Hard ceiling on the DOM settle wait.
    pub settle_timeout: Duration,
    /// Settle polling interval.
    pub settle_poll_interval: Duration,
    /// Budget for the click event sequence.
    pub click_timeout: Duration,
    /// How long to wait for a frame's execution context.
    pub execution_context_wait: Duration,
    /// URL substrings identifying ad/tracking frames that are never worth
    /// a dedicated session.
    pub ad_frame_deny_list: Vec<String>,
    /// Dispatch actions through CDP primitives; when false, the
    /// XPath-addressed fallback path is used for every action.
    pub cdp_actions: bool,
    /// Attempt budget for structured LLM output.
    pub llm_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capture_retries: 3,
            snapshot_ttl: Duration::from_secs(1),
            settle_timeout: Duration::from_millis(5000),
            settle_poll_interval: Duration::from_millis(100),
            click_timeout: Duration::from_millis(3500),
            execution_context_wait: Duration::from_millis(750),
            ad_frame_deny_list: [
                "doubleclick.net",
                "googlesyndication.com",
                "googletagmanager.com",
                "adservice.",
                "/ads/",
                "adsystem.",
                "taboola.com",
                "outbrain.com",
            ]
            .map(String::from)
            .to_vec(),
            cdp_actions: true,
            llm_attempts: 3,
        }
    }
}

impl EngineConfig {
    /// Whether a frame URL matches the ad/tracking deny list.
    pub fn is_denied_frame_url(&self, url: &str) -> bool {
        self.ad_frame_deny_list
            .iter()
            .any(|pattern| url.contains(pattern.as_str()))
    }
}

/// Per-observation options.
#[derive(Debug, Clone, Default)]
pub struct ObserveOptions {
    /// Collect bounding boxes and compose the labeled overlay image.
    pub visual_mode: bool,
    /// Serve a recent snapshot when one is still valid.
    pub use_cache: bool,
    /// Emit each frame's formatted listing as a `lookout::stream` trace
    /// event as soon as it is rendered, for integrators that forward
    /// partial observations.
    pub streaming: bool,
    /// Directory for per-capture debug artifacts.
    pub debug_dir: Option<PathBuf>,
}

impl ObserveOptions {
    /// Enable visual mode.
    #[must_use]
    pub fn visual_mode(mut self, visual_mode: bool) -> Self {
        self.visual_mode = visual_mode;
        self
    }

    /// Enable snapshot caching.
    #[must_use]
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Stream frame listings as they render.
    #[must_use]
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Write debug artifacts to the given directory.
    #[must_use]
    pub fn debug_dir(mut self, debug_dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(debug_dir.into());
        self
    }
}

#[cfg(test)]
mod tests;
