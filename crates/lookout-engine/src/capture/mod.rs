//! DOM and accessibility capture.
//!
//! Produces a snapshot in seven passes; the ordering is contract-level:
//!
//! 1. DOM walk: backend-id maps per frame ([`dom_walk`]).
//! 2. OOPIF discovery: dedicated sessions, independent walks.
//! 3. Frame-graph sync: bridge iframe elements to frame records.
//! 4. Accessibility trees: per frame, in parallel ([`a11y`]).
//! 5. Scrollable detection: probe per frame context ([`scrollable`]).
//! 6. Tree build and cleaning ([`tree`]).
//! 7. Merge and format ([`format`]).
//!
//! Root-session failures of the transient class retry the whole capture;
//! per-iframe failures degrade to omission.

pub(crate) mod a11y;
pub(crate) mod dom_walk;
pub(crate) mod format;
pub(crate) mod scrollable;
pub(crate) mod tree;

pub use format::parse_encoded_ids;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use lookout_cdp::protocol::accessibility::AXNode;
use lookout_cdp::protocol::dom::{BackendNodeId, GetDocumentParams, GetDocumentResult};

use crate::config::EngineConfig;
use crate::driver::{BrowserAdapter, Page};
use crate::encoded_id::EncodedId;
use crate::error::CaptureError;
use crate::frame_graph::FrameGraph;
use crate::settle;
use crate::snapshot::{AccessibilityNode, IframeInfo};

use dom_walk::DomMaps;
use tree::{CleanNode, TreeBuild, collect_elements};

/// Per-capture timings and counters, serialized into the debug metrics
/// artifact.
#[derive(Debug, Default, Serialize)]
pub struct CaptureMetrics {
    /// Wall time per pass, milliseconds.
    pub pass_timings_ms: BTreeMap<String, u128>,
    /// Frames that made it into the snapshot.
    pub frames_captured: usize,
    /// Frames dropped as unmatched or failed, with reasons.
    pub dropped_frames: Vec<String>,
    /// Kept element count.
    pub element_count: usize,
    /// Capture attempts spent (1 = no retry).
    pub attempts: u32,
}

/// Everything a capture produces; the engine folds this into a
/// [`Snapshot`](crate::snapshot::Snapshot).
#[derive(Debug)]
pub(crate) struct CaptureOutput {
    pub dom_state: String,
    pub elements: BTreeMap<EncodedId, AccessibilityNode>,
    pub xpath_map: HashMap<EncodedId, String>,
    pub backend_node_map: HashMap<EncodedId, BackendNodeId>,
    pub frame_map: BTreeMap<u64, IframeInfo>,
    pub metrics: CaptureMetrics,
}

/// Run the capture with the transient-failure retry loop.
///
/// Execution-context-destroyed and target-closed failures on the root
/// session retry the whole capture (waiting for the DOM to settle in
/// between); anything else propagates immediately.
#[instrument(level = "debug", skip_all, fields(target_id = %page.target_id()))]
pub(crate) async fn capture_with_retries<A: BrowserAdapter>(
    page: &Page,
    graph: &FrameGraph,
    adapter: &A,
    config: &EngineConfig,
) -> Result<CaptureOutput, CaptureError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match capture_once(page, graph, adapter, config).await {
            Ok(mut output) => {
                output.metrics.attempts = attempt;
                return Ok(output);
            }
            Err(CaptureError::Cdp(e)) if e.is_context_lost() && attempt < config.capture_retries => {
                warn!(attempt = attempt, error = %e, "capture hit transient failure, retrying");
                let _ = settle::wait_for_settled_dom(page, config).await;
            }
            Err(CaptureError::Cdp(e)) if e.is_context_lost() => {
                return Err(CaptureError::RetriesExhausted {
                    attempts: attempt,
                    source: e,
                });
            }
            Err(other) => return Err(other),
        }
    }
}

async fn capture_once<A: BrowserAdapter>(
    page: &Page,
    graph: &FrameGraph,
    adapter: &A,
    config: &EngineConfig,
) -> Result<CaptureOutput, CaptureError> {
    let mut metrics = CaptureMetrics::default();
    let root_session = page.root_session();

    graph.ensure_initialized().await?;
    root_session
        .send_command::<(), serde_json::Value>("DOM.enable", None)
        .await?;
    root_session
        .send_command::<(), serde_json::Value>("Accessibility.enable", None)
        .await?;

    // Pass 1: walk the pierced main-session tree.
    let started = Instant::now();
    let document: GetDocumentResult = root_session
        .send_command(
            "DOM.getDocument",
            Some(GetDocumentParams {
                depth: Some(-1),
                pierce: Some(true),
            }),
        )
        .await?;
    let mut maps = DomMaps::default();
    let mut next_frame_index = 1u64;
    dom_walk::walk_document(&document.root, 0, &mut next_frame_index, &mut maps);
    metrics
        .pass_timings_ms
        .insert("dom_walk".to_string(), started.elapsed().as_millis());

    // Pass 2: discover OOPIFs and walk each on its own session. Session
    // probing is parallel inside the graph; document fetches are
    // parallel here, the pure walks merge sequentially.
    let started = Instant::now();
    let registrations = graph.capture_oopifs(adapter, page, next_frame_index).await?;
    // The registrations consumed indices from the graph's allocator;
    // move the local allocator past them before walking their trees.
    next_frame_index = registrations
        .iter()
        .map(|registration| registration.frame_index + 1)
        .max()
        .unwrap_or(next_frame_index)
        .max(next_frame_index);
    let fetches = registrations.iter().map(|registration| async move {
        let enabled = registration
            .session
            .send_command::<(), serde_json::Value>("DOM.enable", None)
            .await;
        if let Err(e) = enabled {
            return (registration, Err(e));
        }
        let doc = registration
            .session
            .send_command::<_, GetDocumentResult>(
                "DOM.getDocument",
                Some(GetDocumentParams {
                    depth: Some(-1),
                    // Transient child frames inside an OOPIF are not
                    // worth piercing into.
                    pierce: Some(false),
                }),
            )
            .await;
        (registration, doc)
    });
    for (registration, doc) in futures::future::join_all(fetches).await {
        match doc {
            Ok(doc) => {
                let mut sub = DomMaps::default();
                dom_walk::walk_document(
                    &doc.root,
                    registration.frame_index,
                    &mut next_frame_index,
                    &mut sub,
                );
                maps.merge(sub);
            }
            Err(e) => {
                warn!(url = %registration.url, error = %e, "OOPIF walk failed, omitting frame");
                metrics
                    .dropped_frames
                    .push(format!("{}: {e}", registration.url));
            }
        }
    }
    metrics
        .pass_timings_ms
        .insert("oopif_discovery".to_string(), started.elapsed().as_millis());

    // Pass 3: sync iframes with the frame graph through the owning
    // element's backend node id.
    let started = Instant::now();
    let mut frame_map: BTreeMap<u64, IframeInfo> = BTreeMap::new();
    let mut dropped_frames: HashSet<u64> = HashSet::new();
    for mut info in std::mem::take(&mut maps.iframes) {
        match graph.record_by_owner(info.iframe_backend_node_id) {
            Some(record) => {
                graph.assign_frame_index(&record.frame_id, info.frame_index);
                info.frame_id = Some(record.frame_id);
                info.execution_context_id = record.execution_context_id;
                info.cdp_session_id = record.session_id;
                info.is_oopif |= record.is_oopif;
                frame_map.insert(info.frame_index, info);
            }
            None => {
                // Transitional or ad frame the graph never learned about.
                warn!(
                    frame_index = info.frame_index,
                    iframe_backend_node_id = info.iframe_backend_node_id,
                    src = info.src.as_deref().unwrap_or(""),
                    "unmatched-frame"
                );
                metrics.dropped_frames.push(format!(
                    "frame {} (owner backend node {}) unmatched",
                    info.frame_index, info.iframe_backend_node_id
                ));
                dropped_frames.insert(info.frame_index);
            }
        }
    }
    // Dropped frames contribute no elements.
    if !dropped_frames.is_empty() {
        maps.tag_name_map
            .retain(|id, _| !dropped_frames.contains(&id.frame_index));
        maps.backend_node_map
            .retain(|id, _| !dropped_frames.contains(&id.frame_index));
        maps.xpath_map
            .retain(|id, _| !dropped_frames.contains(&id.frame_index));
        maps.accessible_name_map
            .retain(|id, _| !dropped_frames.contains(&id.frame_index));
    }
    annotate_frame_paths(&mut frame_map);
    metrics
        .pass_timings_ms
        .insert("graph_sync".to_string(), started.elapsed().as_millis());

    // Pass 4: accessibility trees, fetched in parallel per frame.
    let started = Instant::now();
    let mut ax_trees: BTreeMap<u64, Vec<AXNode>> = BTreeMap::new();
    ax_trees.insert(0, a11y::fetch_full_tree(root_session).await?);

    let same_origin = frame_map
        .values()
        .filter(|info| !info.is_oopif)
        .filter_map(|info| {
            info.content_document_backend_node_id
                .map(|doc_id| (info.frame_index, doc_id))
        })
        .collect::<Vec<_>>();
    let same_origin_fetches = same_origin.iter().map(|&(frame_index, doc_id)| async move {
        (
            frame_index,
            a11y::fetch_same_origin_tree(root_session, doc_id).await,
        )
    });

    let oopif_sessions: Vec<(u64, std::sync::Arc<lookout_cdp::CdpSession>)> = frame_map
        .values()
        .filter(|info| info.is_oopif)
        .filter_map(|info| {
            info.frame_id
                .as_deref()
                .and_then(|frame_id| graph.session_for_frame(frame_id))
                .map(|session| (info.frame_index, session))
        })
        .collect();
    let oopif_fetches = oopif_sessions.iter().map(|(frame_index, session)| async move {
        let enabled = session
            .send_command::<(), serde_json::Value>("Accessibility.enable", None)
            .await;
        match enabled {
            Ok(_) => (*frame_index, a11y::fetch_full_tree(session).await),
            Err(e) => (*frame_index, Err(CaptureError::Cdp(e))),
        }
    });

    let (same_origin_results, oopif_results) = futures::join!(
        futures::future::join_all(same_origin_fetches),
        futures::future::join_all(oopif_fetches),
    );
    for (frame_index, result) in same_origin_results {
        match result {
            Ok(nodes) => {
                ax_trees.insert(frame_index, nodes);
            }
            // Same-origin fetches ride the root session; losing it is a
            // whole-capture retry, not a per-frame degradation.
            Err(CaptureError::Cdp(e)) if e.is_context_lost() => {
                return Err(CaptureError::Cdp(e));
            }
            Err(e) => {
                warn!(frame_index = frame_index, error = %e, "AX fetch failed, omitting frame");
                metrics
                    .dropped_frames
                    .push(format!("frame {frame_index}: {e}"));
                frame_map.remove(&frame_index);
            }
        }
    }
    for (frame_index, result) in oopif_results {
        match result {
            Ok(nodes) => {
                ax_trees.insert(frame_index, nodes);
            }
            Err(e) => {
                warn!(frame_index = frame_index, error = %e, "AX fetch failed, omitting frame");
                metrics
                    .dropped_frames
                    .push(format!("frame {frame_index}: {e}"));
                frame_map.remove(&frame_index);
            }
        }
    }
    for (frame_index, nodes) in &mut ax_trees {
        let fetched = std::mem::take(nodes);
        *nodes = a11y::with_fallback(
            fetched,
            *frame_index,
            &maps.tag_name_map,
            &maps.accessible_name_map,
        );
    }
    metrics
        .pass_timings_ms
        .insert("ax_fetch".to_string(), started.elapsed().as_millis());

    // Pass 5: scrollable sets per frame.
    let started = Instant::now();
    let mut scrollables: HashMap<u64, HashSet<BackendNodeId>> = HashMap::new();
    let main_scrollables =
        scrollable::detect_scrollables(root_session, None, 0, &maps.xpath_map).await;
    scrollables.insert(0, main_scrollables.unwrap_or_default());
    for info in frame_map.values() {
        let detected = if info.is_oopif {
            let Some(session) = info
                .frame_id
                .as_deref()
                .and_then(|frame_id| graph.session_for_frame(frame_id))
            else {
                continue;
            };
            scrollable::detect_scrollables(&session, None, info.frame_index, &maps.xpath_map).await
        } else {
            let Some(context_id) = info.execution_context_id else {
                // No context yet; decoration for this frame is skipped.
                continue;
            };
            scrollable::detect_scrollables(
                root_session,
                Some(context_id),
                info.frame_index,
                &maps.xpath_map,
            )
            .await
        };
        match detected {
            Ok(set) => {
                scrollables.insert(info.frame_index, set);
            }
            Err(e) => {
                debug!(frame_index = info.frame_index, error = %e, "scrollable probe failed");
            }
        }
    }
    metrics
        .pass_timings_ms
        .insert("scrollable_probe".to_string(), started.elapsed().as_millis());

    // Pass 6: build and clean per-frame trees.
    let started = Instant::now();
    let empty = HashSet::new();
    let mut trees: BTreeMap<u64, Vec<CleanNode>> = BTreeMap::new();
    for (frame_index, nodes) in &ax_trees {
        if *frame_index != 0 && !frame_map.contains_key(frame_index) {
            continue;
        }
        let build = TreeBuild {
            frame_index: *frame_index,
            scrollable: scrollables.get(frame_index).unwrap_or(&empty),
            tag_name_map: &maps.tag_name_map,
        };
        trees.insert(*frame_index, build.build(nodes));
    }

    // Kept nodes must stay addressable: anything the DOM walk never
    // recorded (a node materialized between passes) is spliced out
    // before the element map is built, so the map-key invariants hold.
    for tree_nodes in trees.values_mut() {
        prune_unmapped(tree_nodes, &maps.backend_node_map);
    }
    let mut elements: BTreeMap<EncodedId, AccessibilityNode> = BTreeMap::new();
    for roots in trees.values() {
        collect_elements(roots, &mut elements);
    }
    metrics
        .pass_timings_ms
        .insert("tree_build".to_string(), started.elapsed().as_millis());

    // Pass 7: merge and format.
    let started = Instant::now();
    let dom_state = format::format_snapshot(&trees, &frame_map);
    metrics
        .pass_timings_ms
        .insert("format".to_string(), started.elapsed().as_millis());

    metrics.frames_captured = 1 + frame_map.len();
    metrics.element_count = elements.len();

    Ok(CaptureOutput {
        dom_state,
        elements,
        xpath_map: maps.xpath_map,
        backend_node_map: maps.backend_node_map,
        frame_map,
        metrics,
    })
}

/// Drop tree nodes that have no DOM-walk backing, splicing their
/// children up.
fn prune_unmapped(nodes: &mut Vec<CleanNode>, backend_node_map: &HashMap<EncodedId, BackendNodeId>) {
    let mut index = 0;
    while index < nodes.len() {
        prune_unmapped(&mut nodes[index].children, backend_node_map);
        if backend_node_map.contains_key(&nodes[index].encoded_id) {
            index += 1;
        } else {
            let removed = nodes.remove(index);
            for (offset, child) in removed.children.into_iter().enumerate() {
                nodes.insert(index + offset, child);
            }
        }
    }
}

/// Fill in the human-readable ancestry strings.
fn annotate_frame_paths(frame_map: &mut BTreeMap<u64, IframeInfo>) {
    let parents: HashMap<u64, Option<u64>> = frame_map
        .iter()
        .map(|(&index, info)| (index, info.parent_frame_index))
        .collect();
    for (&index, info) in frame_map.iter_mut() {
        let mut chain = vec![index];
        let mut cursor = index;
        while let Some(&Some(parent)) = parents.get(&cursor) {
            if parent == 0 || chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            cursor = parent;
        }
        chain.reverse();
        let path: Vec<String> = std::iter::once("Main".to_string())
            .chain(chain.iter().map(|i| format!("Frame {i}")))
            .collect();
        info.frame_path = Some(path.join(" → "));
    }
}

#[cfg(test)]
mod tests;
