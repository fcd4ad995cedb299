//! Debug artifact writers.
//!
//! When an observation is given a debug directory, the capture leaves a
//! paper trail behind: the formatted tree, the frame-graph dump, pass
//! timings, and (in visual mode) the screenshot plus any layout
//! failures. Per-step outputs land under `steps/`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::capture::CaptureMetrics;
use crate::overlay::BoxFailure;

/// Writer bound to one capture's debug directory.
#[derive(Debug, Clone)]
pub struct DebugWriter {
    dir: PathBuf,
}

impl DebugWriter {
    /// Bind to a directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub async fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// The bound directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the formatted element tree (`elems.txt`).
    pub async fn write_elements(&self, dom_state: &str) {
        self.write_file("elems.txt", dom_state.as_bytes()).await;
    }

    /// Write the frame-graph dump (`frames.json`).
    pub async fn write_frames(&self, frames: &serde_json::Value) {
        self.write_json("frames.json", frames).await;
    }

    /// Write pass timings (`perf.json`) and the full capture metrics
    /// (`dom-capture-metrics.json`).
    pub async fn write_metrics(&self, metrics: &CaptureMetrics) {
        let perf = serde_json::json!({ "pass_timings_ms": metrics.pass_timings_ms });
        self.write_json("perf.json", &perf).await;
        match serde_json::to_value(metrics) {
            Ok(value) => self.write_json("dom-capture-metrics.json", &value).await,
            Err(e) => warn!(error = %e, "metrics serialization failed"),
        }
    }

    /// Write the screenshot (`screenshot.png`), visual mode only.
    pub async fn write_screenshot(&self, png: &[u8]) {
        self.write_file("screenshot.png", png).await;
    }

    /// Write elements the layout engine could not place
    /// (`bbox-failures.json`).
    pub async fn write_box_failures(&self, failures: &[BoxFailure]) {
        if failures.is_empty() {
            return;
        }
        match serde_json::to_value(failures) {
            Ok(value) => self.write_json("bbox-failures.json", &value).await,
            Err(e) => warn!(error = %e, "box failure serialization failed"),
        }
    }

    /// Write one agent step's combined output
    /// (`steps/<n>/stepOutput.json`).
    pub async fn write_step_output(
        &self,
        step: u32,
        agent_output: &serde_json::Value,
        action_output: &serde_json::Value,
    ) {
        let step_dir = self.dir.join("steps").join(step.to_string());
        if let Err(e) = tokio::fs::create_dir_all(&step_dir).await {
            warn!(error = %e, "step directory creation failed");
            return;
        }
        let combined = serde_json::json!({
            "agentOutput": agent_output,
            "actionOutput": action_output,
        });
        let path = step_dir.join("stepOutput.json");
        match serde_json::to_vec_pretty(&combined) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&path, bytes).await {
                    warn!(path = %path.display(), error = %e, "step output write failed");
                }
            }
            Err(e) => warn!(error = %e, "step output serialization failed"),
        }
    }

    async fn write_json(&self, name: &str, value: &serde_json::Value) {
        match serde_json::to_vec_pretty(value) {
            Ok(bytes) => self.write_file(name, &bytes).await,
            Err(e) => warn!(file = name, error = %e, "serialization failed"),
        }
    }

    /// Artifact writes never fail a capture; they log and move on.
    async fn write_file(&self, name: &str, bytes: &[u8]) {
        let path = self.dir.join(name);
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => debug!(path = %path.display(), "debug artifact written"),
            Err(e) => warn!(path = %path.display(), error = %e, "debug artifact write failed"),
        }
    }
}
