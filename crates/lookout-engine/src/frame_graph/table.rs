//! Pure frame-table state.
//!
//! Everything here is synchronous bookkeeping: records keyed by frame id,
//! index allocation, ancestry walks. The async shell in the parent module
//! owns the CDP wiring and feeds events in.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use serde::Serialize;

use lookout_cdp::protocol::dom::BackendNodeId;
use lookout_cdp::protocol::page::FrameId;
use lookout_cdp::protocol::runtime::ExecutionContextId;

/// One frame known to the graph.
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    /// CDP frame id.
    pub frame_id: FrameId,
    /// Parent frame id; `None` for the root.
    pub parent_frame_id: Option<FrameId>,
    /// Assigned frame index. Preliminary until DOM traversal imposes the
    /// depth-first order.
    pub frame_index: Option<u64>,
    /// Loader id from the last navigation.
    pub loader_id: Option<String>,
    /// Frame name.
    pub name: Option<String>,
    /// Frame document URL.
    pub url: Option<String>,
    /// Session routing to this frame; absent for frames served by the
    /// root session.
    pub session_id: Option<String>,
    /// Default-world execution context, when known.
    pub execution_context_id: Option<ExecutionContextId>,
    /// Backend node id of the owning iframe element in the parent
    /// document.
    pub backend_node_id: Option<BackendNodeId>,
    /// Whether this frame lives in its own process.
    pub is_oopif: bool,
    /// Monotonic update stamp.
    #[serde(skip)]
    pub last_updated: Instant,
}

impl FrameRecord {
    fn new(frame_id: FrameId, parent_frame_id: Option<FrameId>) -> Self {
        Self {
            frame_id,
            parent_frame_id,
            frame_index: None,
            loader_id: None,
            name: None,
            url: None,
            session_id: None,
            execution_context_id: None,
            backend_node_id: None,
            is_oopif: false,
            last_updated: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_updated = Instant::now();
    }
}

/// The graph's record store.
///
/// Invariants: one record per frame id; frame indices are unique; parent
/// pointers either resolve to another record or are null; the root frame
/// holds index 0.
#[derive(Debug, Default)]
pub struct FrameTable {
    records: HashMap<FrameId, FrameRecord>,
    root: Option<FrameId>,
    next_preliminary_index: u64,
    /// Target ids already probed into OOPIF sessions.
    attached_targets: HashSet<String>,
}

impl FrameTable {
    /// Register the root frame with index 0.
    pub fn register_root(&mut self, frame_id: &str) {
        let mut record = FrameRecord::new(frame_id.to_string(), None);
        record.frame_index = Some(0);
        self.records.insert(frame_id.to_string(), record);
        self.root = Some(frame_id.to_string());
        if self.next_preliminary_index == 0 {
            self.next_preliminary_index = 1;
        }
    }

    /// The root frame id.
    pub fn root_frame_id(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Insert or refresh a record for an attached frame.
    ///
    /// New frames get a monotonically allocated preliminary index; the
    /// DOM walk later overwrites it with the depth-first value.
    pub fn upsert_attached(&mut self, frame_id: &str, parent_frame_id: Option<&str>) {
        if let Some(record) = self.records.get_mut(frame_id) {
            if parent_frame_id.is_some() {
                record.parent_frame_id = parent_frame_id.map(ToString::to_string);
            }
            record.touch();
            return;
        }
        let mut record =
            FrameRecord::new(frame_id.to_string(), parent_frame_id.map(ToString::to_string));
        record.frame_index = Some(self.allocate_preliminary_index());
        self.records.insert(frame_id.to_string(), record);
    }

    fn allocate_preliminary_index(&mut self) -> u64 {
        let index = self.next_preliminary_index;
        self.next_preliminary_index += 1;
        index
    }

    /// Record the owning iframe element of a frame.
    pub fn set_owner(&mut self, frame_id: &str, backend_node_id: BackendNodeId) {
        if let Some(record) = self.records.get_mut(frame_id) {
            record.backend_node_id = Some(backend_node_id);
            record.touch();
        }
    }

    /// Apply a navigation: refresh url, name and loader id.
    pub fn navigated(&mut self, frame: &lookout_cdp::protocol::page::Frame) {
        if !self.records.contains_key(&frame.id) {
            // Navigations can be the first thing we hear about a frame.
            self.upsert_attached(&frame.id, frame.parent_id.as_deref());
        }
        if let Some(record) = self.records.get_mut(&frame.id) {
            record.url = Some(match &frame.url_fragment {
                Some(fragment) => format!("{}{fragment}", frame.url),
                None => frame.url.clone(),
            });
            record.name.clone_from(&frame.name);
            record.loader_id.clone_from(&frame.loader_id);
            record.touch();
        }
    }

    /// Remove a frame and all its descendants.
    ///
    /// Returns the removed frame ids, the detached frame first.
    pub fn detach(&mut self, frame_id: &str) -> Vec<FrameId> {
        let mut removed = Vec::new();
        let mut queue = vec![frame_id.to_string()];
        while let Some(id) = queue.pop() {
            if self.records.remove(&id).is_some() {
                queue.extend(
                    self.records
                        .values()
                        .filter(|r| r.parent_frame_id.as_deref() == Some(id.as_str()))
                        .map(|r| r.frame_id.clone()),
                );
                removed.push(id);
            }
        }
        if self.root.as_deref() == Some(frame_id) {
            self.root = None;
        }
        removed
    }

    /// Store the default-world execution context for a frame.
    ///
    /// Returns whether the frame was known.
    pub fn set_execution_context(&mut self, frame_id: &str, context_id: ExecutionContextId) -> bool {
        if let Some(record) = self.records.get_mut(frame_id) {
            record.execution_context_id = Some(context_id);
            record.touch();
            true
        } else {
            false
        }
    }

    /// Invalidate a destroyed execution context wherever it is stored.
    pub fn clear_execution_context(&mut self, context_id: ExecutionContextId) {
        for record in self.records.values_mut() {
            if record.execution_context_id == Some(context_id) {
                record.execution_context_id = None;
                record.touch();
            }
        }
    }

    /// Invalidate stored contexts for one session
    /// (Runtime.executionContextsCleared is session-scoped).
    ///
    /// `None` addresses frames served by the root session.
    pub fn clear_contexts_for_session(&mut self, session_id: Option<&str>) {
        for record in self.records.values_mut() {
            if record.session_id.as_deref() == session_id
                && record.execution_context_id.take().is_some()
            {
                record.touch();
            }
        }
    }

    /// Authoritatively assign a depth-first frame index.
    ///
    /// A preliminary holder of the same index is displaced onto a fresh
    /// preliminary value so index uniqueness holds throughout.
    pub fn assign_frame_index(&mut self, frame_id: &str, index: u64) {
        if !self.records.contains_key(frame_id) {
            return;
        }
        let displaced = self
            .records
            .values()
            .find(|r| r.frame_index == Some(index) && r.frame_id != frame_id)
            .map(|r| r.frame_id.clone());
        if let Some(other) = displaced {
            let fresh = self.allocate_preliminary_index();
            if let Some(record) = self.records.get_mut(&other) {
                record.frame_index = Some(fresh);
            }
        }
        if let Some(record) = self.records.get_mut(frame_id) {
            record.frame_index = Some(index);
            record.touch();
        }
        if self.next_preliminary_index <= index {
            self.next_preliminary_index = index + 1;
        }
    }

    /// Allocate the next free index at or above `start`.
    pub fn allocate_index_at_least(&mut self, start: u64) -> u64 {
        if self.next_preliminary_index < start {
            self.next_preliminary_index = start;
        }
        self.allocate_preliminary_index()
    }

    /// Register an OOPIF discovered through a successful child attach.
    pub fn register_oopif(
        &mut self,
        frame_id: &str,
        parent_frame_id: Option<&str>,
        index: u64,
        session_id: &str,
        url: Option<&str>,
    ) {
        let record = self
            .records
            .entry(frame_id.to_string())
            .or_insert_with(|| FrameRecord::new(frame_id.to_string(), None));
        if record.parent_frame_id.is_none() {
            record.parent_frame_id = parent_frame_id.map(ToString::to_string);
        }
        record.frame_index = Some(index);
        record.session_id = Some(session_id.to_string());
        record.is_oopif = true;
        if let Some(url) = url {
            record.url = Some(url.to_string());
        }
        record.touch();
        if self.next_preliminary_index <= index {
            self.next_preliminary_index = index + 1;
        }
    }

    /// Remember that a target was already probed.
    ///
    /// Returns false when it was known, so callers skip duplicate
    /// attaches.
    pub fn mark_target_probed(&mut self, target_id: &str) -> bool {
        self.attached_targets.insert(target_id.to_string())
    }

    /// Look up a record.
    pub fn get(&self, frame_id: &str) -> Option<&FrameRecord> {
        self.records.get(frame_id)
    }

    /// Look up a record by frame index.
    pub fn by_index(&self, index: u64) -> Option<&FrameRecord> {
        self.records.values().find(|r| r.frame_index == Some(index))
    }

    /// Look up a record by the backend node id of its owning iframe.
    pub fn by_owner_backend_node_id(&self, backend_node_id: BackendNodeId) -> Option<&FrameRecord> {
        self.records
            .values()
            .find(|r| r.backend_node_id == Some(backend_node_id))
    }

    /// Whether the session id belongs to a tracked frame or the graph.
    pub fn knows_session(&self, session_id: &str) -> bool {
        self.records
            .values()
            .any(|r| r.session_id.as_deref() == Some(session_id))
    }

    /// All records, for dumps and tests.
    pub fn records(&self) -> impl Iterator<Item = &FrameRecord> {
        self.records.values()
    }

    /// Number of tracked frames.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check the structural invariants; returns violations found.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();

        let mut seen = HashMap::new();
        for record in self.records.values() {
            if let Some(index) = record.frame_index {
                if let Some(other) = seen.insert(index, &record.frame_id) {
                    violations.push(format!(
                        "frame index {index} held by both {other} and {}",
                        record.frame_id
                    ));
                }
            }
            if let Some(parent) = &record.parent_frame_id {
                if !self.records.contains_key(parent) {
                    violations.push(format!(
                        "{} has dangling parent {parent}",
                        record.frame_id
                    ));
                }
            }
        }

        if let Some(root) = &self.root {
            if self.records.get(root).and_then(|r| r.frame_index) != Some(0) {
                violations.push("root frame does not hold index 0".to_string());
            }
        }

        // Parent pointers must not loop.
        for record in self.records.values() {
            let mut hops = 0;
            let mut cursor = record.parent_frame_id.as_deref();
            while let Some(parent) = cursor {
                hops += 1;
                if hops > self.records.len() {
                    violations.push(format!("cycle through {}", record.frame_id));
                    break;
                }
                cursor = self
                    .records
                    .get(parent)
                    .and_then(|r| r.parent_frame_id.as_deref());
            }
        }

        violations
    }
}
