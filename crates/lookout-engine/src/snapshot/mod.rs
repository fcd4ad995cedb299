//! Snapshot types.
//!
//! A [`Snapshot`] is the output of one capture cycle: the formatted tree
//! the model reads plus the maps that let the engine translate the
//! model's element choices back into live CDP addresses. Snapshots are
//! cheap to share and never mutated after capture; staleness is tracked
//! through a dirty flag and the owning graph's generation counter.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;

use lookout_cdp::protocol::dom::BackendNodeId;
use lookout_cdp::protocol::page::FrameId;
use lookout_cdp::protocol::runtime::ExecutionContextId;

use crate::encoded_id::EncodedId;

/// A rectangle in main-viewport CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub top: f64,
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    /// Build a rectangle from origin and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            top: y,
            left: x,
            right: x + width,
            bottom: y + height,
        }
    }

    /// The center point.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// This rectangle shifted by an offset.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Whether the rectangle overlaps a `(0, 0, width, height)` viewport
    /// at all.
    pub fn intersects_viewport(&self, viewport_width: f64, viewport_height: f64) -> bool {
        self.right > 0.0 && self.bottom > 0.0 && self.x < viewport_width && self.y < viewport_height
    }
}

/// A kept node of the merged accessibility tree.
#[derive(Debug, Clone, Serialize)]
pub struct AccessibilityNode {
    /// Display role, possibly decorated with a `scrollable` prefix.
    pub role: String,
    /// Normalized accessible name.
    pub name: Option<String>,
    /// Accessible description, when distinct from the name.
    pub description: Option<String>,
    /// Current value for value-bearing roles.
    pub value: Option<String>,
    /// The backing DOM node.
    pub backend_dom_node_id: BackendNodeId,
    /// Kept children, in document order.
    pub children: Option<Vec<EncodedId>>,
}

/// Everything the engine knows about one iframe, bridged across the DOM
/// walk (which discovers the element) and the frame graph (which knows
/// the frame's session and context).
#[derive(Debug, Clone, Serialize)]
pub struct IframeInfo {
    /// Depth-first frame index.
    pub frame_index: u64,
    /// Parent frame index; `None` only for the main frame's entry.
    pub parent_frame_index: Option<u64>,
    /// Backend node id of the `<iframe>` element in the parent document.
    /// This is the bridge key into the frame graph.
    pub iframe_backend_node_id: BackendNodeId,
    /// Backend node id of the content document; same-origin only.
    pub content_document_backend_node_id: Option<BackendNodeId>,
    /// XPath of the `<iframe>` element within its parent document.
    pub xpath: String,
    /// The iframe's `src` attribute.
    pub src: Option<String>,
    /// The iframe's `name` attribute.
    pub name: Option<String>,
    /// Position among sibling iframes of the same parent document.
    pub sibling_position: usize,
    /// CDP frame id, populated by the graph sync pass.
    pub frame_id: Option<FrameId>,
    /// Default-world execution context, populated by the graph sync pass.
    pub execution_context_id: Option<ExecutionContextId>,
    /// Session routing to this frame, populated for OOPIFs.
    pub cdp_session_id: Option<String>,
    /// Whether the frame is an out-of-process iframe.
    pub is_oopif: bool,
    /// The iframe element's rectangle in main-viewport coordinates.
    pub absolute_bounding_box: Option<Rect>,
    /// Human-readable ancestry ("Main → Frame 1 → Frame 3").
    pub frame_path: Option<String>,
}

/// Cached result of resolving an encoded id to a live object.
#[derive(Debug, Clone)]
pub(crate) struct CachedResolution {
    pub backend_node_id: BackendNodeId,
    pub object_id: String,
    pub session_id: String,
}

/// The output of a capture cycle.
///
/// Every key of `elements` also appears in `backend_node_map` and
/// `xpath_map`; every frame index embedded in any key appears in
/// `frame_map`. Rectangles are main-viewport coordinates regardless of
/// source frame.
#[derive(Debug)]
pub struct Snapshot {
    /// Formatted text tree for model consumption.
    pub dom_state: String,
    /// Kept accessibility nodes by encoded id.
    pub elements: BTreeMap<EncodedId, AccessibilityNode>,
    /// Document-relative XPath per element, trailing `/text()` stripped.
    pub xpath_map: HashMap<EncodedId, String>,
    /// Backend node id per element.
    pub backend_node_map: HashMap<EncodedId, BackendNodeId>,
    /// Frame metadata by frame index.
    pub frame_map: BTreeMap<u64, IframeInfo>,
    /// Viewport-absolute rectangles, visual mode only.
    pub bounding_box_map: Option<HashMap<EncodedId, Rect>>,
    /// Composite labeled screenshot, visual mode only.
    pub visual_overlay: Option<Bytes>,
    /// Frame-graph generation this snapshot was captured at.
    pub(crate) generation: u64,
    pub(crate) captured_at: Instant,
    pub(crate) dirty: AtomicBool,
    /// Per-snapshot resolved-element cache; dies with the snapshot.
    pub(crate) resolutions: Mutex<HashMap<EncodedId, CachedResolution>>,
    /// Backend ids refreshed by XPath recovery, shadowing
    /// `backend_node_map` entries for elements the page re-created.
    pub(crate) backend_overrides: Mutex<HashMap<EncodedId, BackendNodeId>>,
}

impl Snapshot {
    /// The element's current backend node id: the capture-time value
    /// unless XPath recovery refreshed it.
    pub fn effective_backend_node_id(&self, id: EncodedId) -> Option<BackendNodeId> {
        if let Some(&fresh) = self.backend_overrides.lock().get(&id) {
            return Some(fresh);
        }
        self.backend_node_map.get(&id).copied()
    }

    /// Record a recovery-refreshed backend node id for an element.
    pub(crate) fn override_backend_node_id(&self, id: EncodedId, backend_node_id: BackendNodeId) {
        self.backend_overrides.lock().insert(id, backend_node_id);
    }

    /// Mark the snapshot stale. Called by the dispatcher after mutating
    /// actions and by navigation invalidation.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Whether the snapshot has been invalidated.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Time since capture.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    /// Whether this snapshot may be served from cache.
    pub(crate) fn is_fresh(&self, current_generation: u64, ttl: Duration) -> bool {
        !self.is_dirty() && self.generation == current_generation && self.age() <= ttl
    }

    /// Check the structural invariants that must hold for any snapshot.
    ///
    /// Returns the violations found; an empty list means the snapshot is
    /// internally consistent.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for id in self.elements.keys() {
            if !self.backend_node_map.contains_key(id) {
                violations.push(format!("{id} missing from backend_node_map"));
            }
            if !self.xpath_map.contains_key(id) {
                violations.push(format!("{id} missing from xpath_map"));
            }
            if id.frame_index != 0 && !self.frame_map.contains_key(&id.frame_index) {
                violations.push(format!("frame index {} missing from frame_map", id.frame_index));
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests;
