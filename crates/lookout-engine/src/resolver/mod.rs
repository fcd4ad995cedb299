//! Element resolution.
//!
//! Turns an encoded id into a live `(session, frame, backend node,
//! object)` tuple. Elements go stale whenever the page re-renders them;
//! the recovery path re-finds the element through its captured XPath in
//! the frame's execution context and patches the snapshot's backend-node
//! map in place, so the same id keeps working across re-renders.

use std::sync::Arc;

use tracing::{debug, instrument, trace};

use lookout_cdp::CdpSession;
use lookout_cdp::protocol::dom::{
    BackendNodeId, DescribeNodeParams, DescribeNodeResult, ResolveNodeParams, ResolveNodeResult,
};
use lookout_cdp::protocol::page::FrameId;
use lookout_cdp::protocol::runtime::{EvaluateParams, EvaluateResult};

use crate::config::EngineConfig;
use crate::encoded_id::EncodedId;
use crate::error::ResolveError;
use crate::frame_graph::FrameGraph;
use crate::snapshot::{CachedResolution, Snapshot};

/// A live address for one element.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    /// Session to dispatch against.
    pub session: Arc<CdpSession>,
    /// Frame the element lives in.
    pub frame_id: FrameId,
    /// Current backend node id (possibly refreshed by recovery).
    pub backend_node_id: BackendNodeId,
    /// Remote object id for `Runtime.callFunctionOn`.
    pub object_id: String,
}

/// Resolve an encoded id against a snapshot.
///
/// # Errors
///
/// - [`ResolveError::BadRequest`]: malformed id.
/// - [`ResolveError::NotFound`]: frame index unknown to the graph, or
///   no XPath captured for the element.
/// - [`ResolveError::FrameNotReady`]: the frame's execution context
///   never arrived within the wait budget.
/// - [`ResolveError::StaleElement`]: XPath recovery found nothing.
#[instrument(level = "debug", skip(snapshot, graph, config))]
pub async fn resolve(
    encoded_id: &str,
    snapshot: &Snapshot,
    graph: &FrameGraph,
    config: &EngineConfig,
) -> Result<ResolvedNode, ResolveError> {
    let id: EncodedId = encoded_id.parse()?;

    let (session, frame_id) = locate_frame(id, snapshot, graph)?;

    // Per-snapshot cache, validated against the current map entry.
    if let Some(cached) = snapshot.resolutions.lock().get(&id).cloned() {
        let current = snapshot.effective_backend_node_id(id);
        if current == Some(cached.backend_node_id) && cached.session_id == session.id() {
            trace!(encoded_id = %id, "resolution cache hit");
            return Ok(ResolvedNode {
                session,
                frame_id,
                backend_node_id: cached.backend_node_id,
                object_id: cached.object_id,
            });
        }
    }

    let backend_node_id = snapshot
        .effective_backend_node_id(id)
        .unwrap_or(id.backend_node_id as BackendNodeId);

    let resolved = match resolve_backend_node(&session, backend_node_id).await {
        Ok(object_id) => ResolvedNode {
            session: Arc::clone(&session),
            frame_id: frame_id.clone(),
            backend_node_id,
            object_id,
        },
        Err(e) if e.is_node_gone() => {
            debug!(encoded_id = %id, "node gone, attempting XPath recovery");
            recover_via_xpath(id, snapshot, graph, config, &session, &frame_id).await?
        }
        Err(e) => return Err(ResolveError::Cdp(e)),
    };

    snapshot.resolutions.lock().insert(
        id,
        CachedResolution {
            backend_node_id: resolved.backend_node_id,
            object_id: resolved.object_id.clone(),
            session_id: session.id().to_string(),
        },
    );
    Ok(resolved)
}

/// Find the session and frame id for an encoded id's frame index.
fn locate_frame(
    id: EncodedId,
    snapshot: &Snapshot,
    graph: &FrameGraph,
) -> Result<(Arc<CdpSession>, FrameId), ResolveError> {
    if id.frame_index == 0 {
        let session = Arc::clone(graph.root_session());
        let frame_id = graph
            .frame_id_for_index(0)
            .ok_or_else(|| ResolveError::NotFound("root frame not in graph".to_string()))?;
        return Ok((session, frame_id));
    }

    // Prefer the snapshot's own record, fall back to an index lookup.
    let frame_id = snapshot
        .frame_map
        .get(&id.frame_index)
        .and_then(|info| info.frame_id.clone())
        .or_else(|| graph.frame_id_for_index(id.frame_index))
        .ok_or_else(|| {
            ResolveError::NotFound(format!(
                "frame index {} not in graph (encoded id {id})",
                id.frame_index
            ))
        })?;

    let session = graph.session_for_frame(&frame_id).ok_or_else(|| {
        ResolveError::NotFound(format!("no session for frame {frame_id} (encoded id {id})"))
    })?;
    Ok((session, frame_id))
}

/// `DOM.resolveNode` on the element's session.
async fn resolve_backend_node(
    session: &Arc<CdpSession>,
    backend_node_id: BackendNodeId,
) -> Result<String, lookout_cdp::CdpError> {
    let result: ResolveNodeResult = session
        .send_command(
            "DOM.resolveNode",
            Some(ResolveNodeParams {
                backend_node_id: Some(backend_node_id),
                ..Default::default()
            }),
        )
        .await?;
    result.object.object_id.ok_or_else(|| {
        lookout_cdp::CdpError::Protocol {
            method: "DOM.resolveNode".to_string(),
            code: -32000,
            message: "No node with given id (null object)".to_string(),
        }
    })
}

/// The stale-element path: evaluate the captured XPath in the frame's
/// context, read the fresh backend node id, patch the snapshot map, and
/// re-resolve.
async fn recover_via_xpath(
    id: EncodedId,
    snapshot: &Snapshot,
    graph: &FrameGraph,
    config: &EngineConfig,
    session: &Arc<CdpSession>,
    frame_id: &str,
) -> Result<ResolvedNode, ResolveError> {
    let xpath = snapshot
        .xpath_map
        .get(&id)
        .ok_or_else(|| ResolveError::NotFound(format!("no xpath for encoded id {id}")))?;

    let context_id = if id.frame_index == 0 {
        // The main frame's default context is addressable implicitly.
        None
    } else {
        let context = graph
            .wait_for_execution_context(frame_id, config.execution_context_wait)
            .await;
        match context {
            Some(context_id) => Some(context_id),
            None => {
                return Err(ResolveError::FrameNotReady(format!(
                    "no execution context for frame {frame_id} after {:?}",
                    config.execution_context_wait
                )));
            }
        }
    };

    let escaped = serde_json::to_string(xpath).map_err(lookout_cdp::CdpError::from)?;
    let result: EvaluateResult = session
        .send_command(
            "Runtime.evaluate",
            Some(EvaluateParams {
                expression: format!(
                    "document.evaluate({escaped}, document, null, \
                     XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
                ),
                context_id,
                silent: Some(true),
                return_by_value: Some(false),
                ..Default::default()
            }),
        )
        .await
        .map_err(ResolveError::Cdp)?;

    let object_id = match (result.result.subtype.as_deref(), result.result.object_id) {
        (Some("null"), _) | (_, None) => {
            return Err(ResolveError::StaleElement(format!(
                "xpath {xpath} no longer matches (encoded id {id})"
            )));
        }
        (_, Some(object_id)) => object_id,
    };

    let described: DescribeNodeResult = session
        .send_command(
            "DOM.describeNode",
            Some(DescribeNodeParams {
                object_id: Some(object_id.clone()),
                ..Default::default()
            }),
        )
        .await
        .map_err(ResolveError::Cdp)?;
    let fresh_backend_node_id = described.node.backend_node_id;

    // Keep the snapshot addressing the element it recovered to. The
    // encoded id itself is unchanged; only the backing node moved.
    snapshot.override_backend_node_id(id, fresh_backend_node_id);

    debug!(
        encoded_id = %id,
        backend_node_id = fresh_backend_node_id,
        "XPath recovery succeeded"
    );

    let object_id = resolve_backend_node(session, fresh_backend_node_id)
        .await
        .map_err(|e| {
            if e.is_node_gone() {
                ResolveError::StaleElement(format!(
                    "recovered node vanished again (encoded id {id})"
                ))
            } else {
                ResolveError::Cdp(e)
            }
        })?;

    Ok(ResolvedNode {
        session: Arc::clone(session),
        frame_id: frame_id.to_string(),
        backend_node_id: fresh_backend_node_id,
        object_id,
    })
}

