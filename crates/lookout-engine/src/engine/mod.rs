//! The engine's public surface.
//!
//! One [`Engine`] serves many pages. Per page it owns the frame graph
//! and the snapshot cache; both die together in [`close`](Engine::close).
//! The caller serializes actions per page; the engine assumes a single
//! in-flight action and does not defend against concurrent dispatch on
//! the same page.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::actions::{self, Action, ActionOutcome};
use crate::capture;
use crate::config::{EngineConfig, ObserveOptions};
use crate::debug::DebugWriter;
use crate::driver::{BrowserAdapter, CdpBrowserAdapter, Page};
use crate::error::EngineError;
use crate::frame_graph::FrameGraph;
use crate::llm::{self, FindOutcome, LanguageModel};
use crate::overlay;
use crate::snapshot::Snapshot;

struct PageEntry {
    graph: Arc<FrameGraph>,
    cache: Option<Arc<Snapshot>>,
}

/// Frame-aware observation and action dispatch over CDP.
pub struct Engine<A: BrowserAdapter = CdpBrowserAdapter> {
    adapter: A,
    config: Arc<EngineConfig>,
    pages: Mutex<HashMap<String, PageEntry>>,
}

impl Engine<CdpBrowserAdapter> {
    /// An engine with the default CDP adapter and configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_adapter(CdpBrowserAdapter, EngineConfig::default())
    }

    /// An engine with the default CDP adapter and a custom
    /// configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_adapter(CdpBrowserAdapter, config)
    }
}

impl Default for Engine<CdpBrowserAdapter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: BrowserAdapter> Engine<A> {
    /// An engine over a custom browser adapter.
    pub fn with_adapter(adapter: A, config: EngineConfig) -> Self {
        Self {
            adapter,
            config: Arc::new(config),
            pages: Mutex::new(HashMap::new()),
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn graph_for(&self, page: &Page) -> Arc<FrameGraph> {
        let mut pages = self.pages.lock();
        let entry = pages
            .entry(page.target_id().to_string())
            .or_insert_with(|| PageEntry {
                graph: Arc::new(FrameGraph::new(
                    Arc::clone(page.root_session()),
                    Arc::clone(&self.config),
                )),
                cache: None,
            });
        Arc::clone(&entry.graph)
    }

    fn cached_snapshot(&self, page: &Page) -> Option<Arc<Snapshot>> {
        self.pages
            .lock()
            .get(page.target_id())
            .and_then(|entry| entry.cache.clone())
    }

    fn store_snapshot(&self, page: &Page, snapshot: Arc<Snapshot>) {
        if let Some(entry) = self.pages.lock().get_mut(page.target_id()) {
            entry.cache = Some(snapshot);
        }
    }

    /// Observe the page: produce a snapshot spanning the main frame,
    /// same-origin iframes, and OOPIFs.
    ///
    /// With `use_cache`, a snapshot younger than the configured TTL that
    /// has seen neither a mutating action nor a navigation is served
    /// as-is.
    ///
    /// # Errors
    ///
    /// Capture failures after retries, and CDP failures outside the
    /// recoverable class.
    #[instrument(level = "debug", skip_all, fields(target_id = %page.target_id()))]
    pub async fn observe(
        &self,
        page: &Page,
        options: ObserveOptions,
    ) -> Result<Arc<Snapshot>, EngineError> {
        let graph = self.graph_for(page);

        if options.use_cache {
            if let Some(cached) = self.cached_snapshot(page) {
                if cached.is_fresh(graph.generation(), self.config.snapshot_ttl) {
                    debug!("serving cached snapshot");
                    return Ok(cached);
                }
            }
        }

        let mut output =
            capture::capture_with_retries(page, &graph, &self.adapter, &self.config).await?;

        if options.streaming {
            for section in output.dom_state.split("\n\n") {
                debug!(target: "lookout::stream", section = %section, "frame listing");
            }
        }

        let mut bounding_box_map = None;
        let mut visual_overlay: Option<Bytes> = None;
        let mut box_failures = Vec::new();
        let mut screenshot: Option<Vec<u8>> = None;
        if options.visual_mode {
            let (boxes, failures) =
                overlay::collect_bounding_boxes(page, &graph, &mut output).await?;
            match overlay::capture_screenshot(page).await {
                Ok(png) => {
                    match overlay::compose_overlay(&png, &boxes) {
                        Ok(composed) => visual_overlay = Some(composed),
                        Err(e) => warn!(error = %e, "overlay composition failed"),
                    }
                    screenshot = Some(png);
                }
                Err(e) => warn!(error = %e, "screenshot failed"),
            }
            bounding_box_map = Some(boxes);
            box_failures = failures;
        }

        if let Some(debug_dir) = &options.debug_dir {
            match DebugWriter::new(debug_dir.clone()).await {
                Ok(writer) => {
                    writer.write_elements(&output.dom_state).await;
                    writer.write_frames(&graph.dump()).await;
                    writer.write_metrics(&output.metrics).await;
                    writer.write_box_failures(&box_failures).await;
                    if let Some(png) = &screenshot {
                        writer.write_screenshot(png).await;
                    }
                }
                Err(e) => warn!(error = %e, "debug directory unavailable"),
            }
        }

        let snapshot = Arc::new(Snapshot {
            dom_state: output.dom_state,
            elements: output.elements,
            xpath_map: output.xpath_map,
            backend_node_map: output.backend_node_map,
            frame_map: output.frame_map,
            bounding_box_map,
            visual_overlay,
            generation: graph.generation(),
            captured_at: std::time::Instant::now(),
            dirty: std::sync::atomic::AtomicBool::new(false),
            resolutions: Mutex::new(HashMap::new()),
            backend_overrides: Mutex::new(HashMap::new()),
        });

        self.store_snapshot(page, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Ask the model to locate an element for a natural-language
    /// instruction against a snapshot.
    ///
    /// # Errors
    ///
    /// Provider failures, and no structured output after the attempt
    /// budget.
    pub async fn find_element<L: LanguageModel>(
        &self,
        instruction: &str,
        snapshot: &Snapshot,
        llm: &L,
    ) -> Result<FindOutcome, EngineError> {
        Ok(llm::find_element(instruction, snapshot, llm, &self.config).await?)
    }

    /// Execute one action against an element of a snapshot.
    ///
    /// Action-local failures (timeout, not interactable, stale after
    /// recovery) come back as `{ok: false}`; structural problems (bad
    /// method, malformed id, unknown frame) and fatal transport failures
    /// are errors.
    ///
    /// # Errors
    ///
    /// Structural `BadRequest`s and fatal CDP failures.
    #[instrument(level = "debug", skip_all, fields(target_id = %page.target_id(), encoded_id = %encoded_id, method = %method))]
    pub async fn execute_action(
        &self,
        page: &Page,
        snapshot: &Snapshot,
        encoded_id: &str,
        method: &str,
        arguments: &[String],
    ) -> Result<ActionOutcome, EngineError> {
        let action = Action::parse(method, arguments).map_err(EngineError::Action)?;
        let graph = self.graph_for(page);

        let result =
            actions::execute(page, &graph, snapshot, &self.config, encoded_id, &action).await;
        match result {
            Ok(outcome) => {
                // The caller's snapshot is stale the moment an action
                // lands, mutating or not.
                snapshot.mark_dirty();
                Ok(outcome)
            }
            Err(e) if e.is_action_local() => {
                debug!(error = %e, "action failed locally");
                Ok(ActionOutcome::failed(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Invalidate any cached observation of the page.
    pub fn invalidate(&self, page: &Page) {
        let mut pages = self.pages.lock();
        if let Some(entry) = pages.get_mut(page.target_id()) {
            entry.graph.invalidate();
            if let Some(cached) = entry.cache.take() {
                cached.mark_dirty();
            }
        }
    }

    /// Dispose the page's sessions and forget its graph and cache.
    /// Idempotent.
    #[instrument(level = "debug", skip_all, fields(target_id = %page.target_id()))]
    pub async fn close(&self, page: &Page) {
        if let Some(entry) = self.pages.lock().remove(page.target_id()) {
            if let Some(cached) = entry.cache {
                cached.mark_dirty();
            }
        }
        page.session_pool().close().await;
    }
}
