//! Frame graph and context manager.
//!
//! The graph is the authoritative live map of frames, sessions and
//! execution contexts for one page. It is fed from two directions that
//! never agree on timing: CDP events (frameAttached/Navigated/Detached,
//! execution-context lifecycle) and the DOM walk, which discovers iframe
//! elements and imposes depth-first frame indices. The bridge between the
//! two worlds is `DOM.getFrameOwner`: the backend node id of the owning
//! `<iframe>` element is the only identifier both sides can see.

mod table;

pub use table::{FrameRecord, FrameTable};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OnceCell, oneshot};
use tracing::{debug, instrument, trace, warn};

use lookout_cdp::protocol::dom::{BackendNodeId, GetFrameOwnerParams, GetFrameOwnerResult};
use lookout_cdp::protocol::page::{
    FrameAttachedEvent, FrameDetachedEvent, FrameId, FrameNavigatedEvent, FrameTree,
    GetFrameTreeResult,
};
use lookout_cdp::protocol::runtime::{
    ExecutionContextCreatedEvent, ExecutionContextDestroyedEvent, ExecutionContextId,
};
use lookout_cdp::{CdpEvent, CdpSession};

use crate::config::EngineConfig;
use crate::driver::{BrowserAdapter, Page};
use crate::error::FrameGraphError;

/// An OOPIF registered by [`FrameGraph::capture_oopifs`], ready for its
/// own capture pass.
#[derive(Debug, Clone)]
pub struct OopifRegistration {
    /// Assigned frame index.
    pub frame_index: u64,
    /// The OOPIF's frame id.
    pub frame_id: FrameId,
    /// The dedicated session routing to the OOPIF.
    pub session: Arc<CdpSession>,
    /// The OOPIF document URL.
    pub url: String,
}

/// Authoritative live map of frames, sessions, and execution contexts.
#[derive(Debug)]
pub struct FrameGraph {
    root_session: Arc<CdpSession>,
    config: Arc<EngineConfig>,
    table: Arc<Mutex<FrameTable>>,
    /// Dedicated sessions by frame id (OOPIFs only).
    sessions: Arc<Mutex<HashMap<FrameId, Arc<CdpSession>>>>,
    /// Callers blocked in `wait_for_execution_context`.
    waiters: Arc<Mutex<HashMap<FrameId, Vec<oneshot::Sender<ExecutionContextId>>>>>,
    /// Bumped on every event that invalidates snapshots.
    generation: Arc<AtomicU64>,
    init: OnceCell<()>,
    event_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl FrameGraph {
    /// Create a graph for a page. No CDP traffic happens until
    /// [`ensure_initialized`](Self::ensure_initialized).
    pub fn new(root_session: Arc<CdpSession>, config: Arc<EngineConfig>) -> Self {
        Self {
            root_session,
            config,
            table: Arc::new(Mutex::new(FrameTable::default())),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            waiters: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            init: OnceCell::new(),
            event_task: Mutex::new(None),
        }
    }

    /// Idempotently initialize the graph.
    ///
    /// First call: subscribes to frame and context events, enables the
    /// Page and Runtime domains on the root session, enumerates
    /// `Page.getFrameTree` (registering every frame with a preliminary
    /// breadth-first index), and resolves every non-root frame's owning
    /// iframe element via `DOM.getFrameOwner`.
    ///
    /// # Errors
    ///
    /// Returns an error when enabling domains or enumerating the tree
    /// fails; `DOM.getFrameOwner` failures are swallowed (it legitimately
    /// fails for the main frame and for frames detaching mid-call).
    #[instrument(level = "debug", skip(self))]
    pub async fn ensure_initialized(&self) -> Result<(), FrameGraphError> {
        self.init
            .get_or_try_init(|| async {
                self.spawn_event_pump();

                self.root_session
                    .send_command::<(), serde_json::Value>("Page.enable", None)
                    .await?;
                self.root_session
                    .send_command::<(), serde_json::Value>("Runtime.enable", None)
                    .await?;

                let tree: GetFrameTreeResult = self
                    .root_session
                    .send_command("Page.getFrameTree", None::<()>)
                    .await?;
                self.register_tree(&tree.frame_tree);

                // Resolve owning iframe elements for every non-root frame.
                let non_root: Vec<FrameId> = {
                    let table = self.table.lock();
                    let root = table.root_frame_id().map(ToString::to_string);
                    table
                        .records()
                        .filter(|r| Some(&r.frame_id) != root.as_ref())
                        .map(|r| r.frame_id.clone())
                        .collect()
                };
                for frame_id in non_root {
                    self.resolve_frame_owner(&frame_id).await;
                }

                debug!(frames = self.table.lock().len(), "frame graph initialized");
                Ok::<(), FrameGraphError>(())
            })
            .await?;
        Ok(())
    }

    /// Register the initial tree breadth-first.
    fn register_tree(&self, tree: &FrameTree) {
        let mut table = self.table.lock();
        table.register_root(&tree.frame.id);
        let mut queue: Vec<(&FrameTree, FrameId)> = tree
            .child_frames
            .iter()
            .flatten()
            .map(|child| (child, tree.frame.id.clone()))
            .collect();
        while !queue.is_empty() {
            let mut next = Vec::new();
            for (node, parent) in queue {
                table.upsert_attached(&node.frame.id, Some(&parent));
                table.navigated(&node.frame);
                next.extend(
                    node.child_frames
                        .iter()
                        .flatten()
                        .map(|child| (child, node.frame.id.clone())),
                );
            }
            queue = next;
        }
    }

    /// Call `DOM.getFrameOwner` and store the owning backend node id.
    /// Failures are swallowed.
    async fn resolve_frame_owner(&self, frame_id: &str) {
        let result: Result<GetFrameOwnerResult, _> = self
            .root_session
            .send_command(
                "DOM.getFrameOwner",
                Some(GetFrameOwnerParams {
                    frame_id: frame_id.to_string(),
                }),
            )
            .await;
        match result {
            Ok(owner) => {
                self.table.lock().set_owner(frame_id, owner.backend_node_id);
            }
            Err(e) => trace!(frame_id = %frame_id, error = %e, "getFrameOwner failed"),
        }
    }

    fn spawn_event_pump(&self) {
        let mut events = self.root_session.subscribe_events();
        let root_session_id = self.root_session.id().to_string();
        let root_session = Arc::clone(&self.root_session);
        let table = Arc::clone(&self.table);
        let sessions = Arc::clone(&self.sessions);
        let waiters = Arc::clone(&self.waiters);
        let generation = Arc::clone(&self.generation);

        let handle = tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                Self::handle_event(
                    &event,
                    &root_session_id,
                    &root_session,
                    &table,
                    &sessions,
                    &waiters,
                    &generation,
                )
                .await;
            }
        });
        *self.event_task.lock() = Some(handle);
    }

    async fn handle_event(
        event: &CdpEvent,
        root_session_id: &str,
        root_session: &Arc<CdpSession>,
        table: &Arc<Mutex<FrameTable>>,
        sessions: &Arc<Mutex<HashMap<FrameId, Arc<CdpSession>>>>,
        waiters: &Arc<Mutex<HashMap<FrameId, Vec<oneshot::Sender<ExecutionContextId>>>>>,
        generation: &Arc<AtomicU64>,
    ) {
        let from_root = event.is_from_session(root_session_id);
        match event.method.as_str() {
            "Page.frameAttached" if from_root => {
                let Some(attached) = event.parse_params::<FrameAttachedEvent>() else {
                    return;
                };
                trace!(frame_id = %attached.frame_id, "frame attached");
                table
                    .lock()
                    .upsert_attached(&attached.frame_id, Some(&attached.parent_frame_id));
                generation.fetch_add(1, Ordering::Release);

                let result: Result<GetFrameOwnerResult, _> = root_session
                    .send_command(
                        "DOM.getFrameOwner",
                        Some(GetFrameOwnerParams {
                            frame_id: attached.frame_id.clone(),
                        }),
                    )
                    .await;
                if let Ok(owner) = result {
                    table
                        .lock()
                        .set_owner(&attached.frame_id, owner.backend_node_id);
                }
            }
            "Page.frameNavigated" if from_root => {
                let Some(navigated) = event.parse_params::<FrameNavigatedEvent>() else {
                    return;
                };
                trace!(frame_id = %navigated.frame.id, url = %navigated.frame.url, "frame navigated");
                table.lock().navigated(&navigated.frame);
                generation.fetch_add(1, Ordering::Release);
            }
            "Page.frameDetached" if from_root => {
                let Some(detached) = event.parse_params::<FrameDetachedEvent>() else {
                    return;
                };
                let removed = table.lock().detach(&detached.frame_id);
                debug!(frame_id = %detached.frame_id, removed = removed.len(), "frame detached");
                let mut sessions = sessions.lock();
                let mut waiters = waiters.lock();
                for frame_id in &removed {
                    sessions.remove(frame_id);
                    waiters.remove(frame_id);
                }
                generation.fetch_add(1, Ordering::Release);
            }
            "Page.loadEventFired" if from_root => {
                generation.fetch_add(1, Ordering::Release);
            }
            "Runtime.executionContextCreated" => {
                let Some(created) = event.parse_params::<ExecutionContextCreatedEvent>() else {
                    return;
                };
                let context = &created.context;
                let Some(aux) = &context.aux_data else { return };
                if !aux.is_default.unwrap_or(false) {
                    return;
                }
                let Some(frame_id) = &aux.frame_id else { return };
                if table.lock().set_execution_context(frame_id, context.id) {
                    trace!(frame_id = %frame_id, context_id = context.id, "execution context stored");
                    if let Some(blocked) = waiters.lock().remove(frame_id) {
                        for waiter in blocked {
                            let _ = waiter.send(context.id);
                        }
                    }
                }
            }
            "Runtime.executionContextDestroyed" => {
                let Some(destroyed) = event.parse_params::<ExecutionContextDestroyedEvent>() else {
                    return;
                };
                table
                    .lock()
                    .clear_execution_context(destroyed.execution_context_id);
            }
            "Runtime.executionContextsCleared" => {
                let session_filter = if from_root {
                    None
                } else {
                    event.session_id.as_deref()
                };
                table.lock().clear_contexts_for_session(session_filter);
            }
            _ => {}
        }
    }

    /// Discover OOPIFs by probing candidate frames with child-session
    /// attaches, in parallel.
    ///
    /// A candidate is any driver-reported frame backed by its own target
    /// that is not the page itself, not already probed, and not on the
    /// ad-frame deny list. A successful attach classifies the frame as an
    /// OOPIF: Page is enabled on the new session, the frame id read, and
    /// the frame registered with an index at or above `start_index`. A
    /// failed attach classifies it as same-origin and is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only when frame enumeration itself fails.
    #[instrument(level = "debug", skip(self, adapter, page))]
    pub async fn capture_oopifs<A: BrowserAdapter>(
        &self,
        adapter: &A,
        page: &Page,
        start_index: u64,
    ) -> Result<Vec<OopifRegistration>, FrameGraphError> {
        let frames = adapter.frames(page).await?;

        let mut candidates = Vec::new();
        {
            let mut table = self.table.lock();
            for descriptor in frames {
                let Some(target_id) = descriptor.target_id.clone() else {
                    continue;
                };
                if target_id == page.target_id() {
                    continue;
                }
                if self.config.is_denied_frame_url(&descriptor.url) {
                    debug!(url = %descriptor.url, "skipping denied ad/tracking frame");
                    continue;
                }
                if !table.mark_target_probed(&target_id) {
                    continue;
                }
                candidates.push(descriptor);
            }
        }

        let probes = candidates.into_iter().map(|descriptor| async move {
            let session = match adapter.open_child_session(page, &descriptor).await {
                Ok(session) => session,
                Err(e) => {
                    // Same-process frame; the main-session DOM walk covers it.
                    debug!(url = %descriptor.url, error = %e, "frame classified same-origin");
                    return None;
                }
            };
            if let Err(e) = session
                .send_command::<(), serde_json::Value>("Page.enable", None)
                .await
            {
                warn!(url = %descriptor.url, error = %e, "Page.enable failed on OOPIF session");
                return None;
            }
            let tree: GetFrameTreeResult = match session
                .send_command("Page.getFrameTree", None::<()>)
                .await
            {
                Ok(tree) => tree,
                Err(e) => {
                    warn!(url = %descriptor.url, error = %e, "getFrameTree failed on OOPIF session");
                    return None;
                }
            };
            if let Err(e) = session
                .send_command::<(), serde_json::Value>("Runtime.enable", None)
                .await
            {
                warn!(url = %descriptor.url, error = %e, "Runtime.enable failed on OOPIF session");
            }
            Some((descriptor, session, tree.frame_tree.frame.id))
        });

        let probed = futures::future::join_all(probes).await;

        let mut registrations = Vec::new();
        for (descriptor, session, frame_id) in probed.into_iter().flatten() {
            let index = {
                let mut table = self.table.lock();
                let root = table.root_frame_id().map(ToString::to_string);
                let index = table.allocate_index_at_least(start_index);
                table.register_oopif(
                    &frame_id,
                    root.as_deref(),
                    index,
                    session.id(),
                    Some(&descriptor.url),
                );
                index
            };
            self.sessions
                .lock()
                .insert(frame_id.clone(), Arc::clone(&session));
            // The owning iframe element lives in the parent document and
            // is the Pass-3 bridge; resolve it on the root session.
            self.resolve_frame_owner(&frame_id).await;
            debug!(frame_id = %frame_id, frame_index = index, url = %descriptor.url, "OOPIF registered");
            registrations.push(OopifRegistration {
                frame_index: index,
                frame_id,
                session,
                url: descriptor.url,
            });
        }

        // OOPIFs from earlier captures stay registered and must be
        // handed back too, or a capture retry would lose their
        // subtrees. Re-shelve any index below `start_index` so the
        // depth-first same-origin assignment cannot collide with it.
        let fresh: HashSet<&FrameId> = registrations.iter().map(|r| &r.frame_id).collect();
        let known: Vec<(FrameId, Arc<CdpSession>)> = self
            .sessions
            .lock()
            .iter()
            .filter(|(frame_id, _)| !fresh.contains(frame_id))
            .map(|(frame_id, session)| (frame_id.clone(), Arc::clone(session)))
            .collect();
        for (frame_id, session) in known {
            let reshelved = {
                let mut table = self.table.lock();
                let Some((frame_index, url)) =
                    table.get(&frame_id).map(|r| (r.frame_index, r.url.clone()))
                else {
                    continue;
                };
                let index = match frame_index {
                    Some(index) if index >= start_index => index,
                    _ => {
                        let index = table.allocate_index_at_least(start_index);
                        table.assign_frame_index(&frame_id, index);
                        index
                    }
                };
                (index, url.unwrap_or_default())
            };
            registrations.push(OopifRegistration {
                frame_index: reshelved.0,
                frame_id,
                session,
                url: reshelved.1,
            });
        }
        Ok(registrations)
    }

    /// Authoritatively overwrite a frame's index with its depth-first
    /// traversal position.
    pub fn assign_frame_index(&self, frame_id: &str, index: u64) {
        self.table.lock().assign_frame_index(frame_id, index);
    }

    /// Resolve when the frame's default execution context is known, or
    /// after `timeout` with `None`.
    #[instrument(level = "trace", skip(self))]
    pub async fn wait_for_execution_context(
        &self,
        frame_id: &str,
        timeout: Duration,
    ) -> Option<ExecutionContextId> {
        if let Some(context_id) = self
            .table
            .lock()
            .get(frame_id)
            .and_then(|r| r.execution_context_id)
        {
            return Some(context_id);
        }

        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .entry(frame_id.to_string())
            .or_default()
            .push(tx);

        // Lost events make this racy: re-check after registering.
        if let Some(context_id) = self
            .table
            .lock()
            .get(frame_id)
            .and_then(|r| r.execution_context_id)
        {
            return Some(context_id);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(context_id)) => Some(context_id),
            _ => None,
        }
    }

    /// The session routing to a frame: its dedicated session for OOPIFs,
    /// the root session otherwise.
    pub fn session_for_frame(&self, frame_id: &str) -> Option<Arc<CdpSession>> {
        if let Some(session) = self.sessions.lock().get(frame_id) {
            return Some(Arc::clone(session));
        }
        self.table
            .lock()
            .get(frame_id)
            .map(|_| Arc::clone(&self.root_session))
    }

    /// Look up a frame id by index.
    pub fn frame_id_for_index(&self, index: u64) -> Option<FrameId> {
        self.table
            .lock()
            .by_index(index)
            .map(|r| r.frame_id.clone())
    }

    /// Snapshot of a record, by frame id.
    pub fn record(&self, frame_id: &str) -> Option<FrameRecord> {
        self.table.lock().get(frame_id).cloned()
    }

    /// Snapshot of a record, looked up by its owning iframe element.
    pub fn record_by_owner(&self, backend_node_id: BackendNodeId) -> Option<FrameRecord> {
        self.table
            .lock()
            .by_owner_backend_node_id(backend_node_id)
            .cloned()
    }

    /// The root session.
    pub fn root_session(&self) -> &Arc<CdpSession> {
        &self.root_session
    }

    /// Current invalidation generation. Snapshots record this at capture
    /// and are unservable once it moves.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Explicitly invalidate cached observations of this page.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Serializable dump of all records, ordered by frame index.
    pub fn dump(&self) -> serde_json::Value {
        let table = self.table.lock();
        let mut records: Vec<FrameRecord> = table.records().cloned().collect();
        records.sort_by_key(|r| r.frame_index);
        serde_json::to_value(records).unwrap_or(serde_json::Value::Null)
    }
}

impl Drop for FrameGraph {
    fn drop(&mut self) {
        if let Some(handle) = self.event_task.lock().take() {
            handle.abort();
        }
    }
}
