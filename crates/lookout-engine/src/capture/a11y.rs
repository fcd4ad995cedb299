//! Pass 4: accessibility tree fetch.
//!
//! The main frame uses `Accessibility.getFullAXTree` on the root session.
//! Same-origin iframes use `Accessibility.getPartialAXTree` anchored at
//! their content document; OOPIFs use `getFullAXTree` on their own
//! sessions. A frame whose tree carries no interactive roles gets a DOM
//! fallback synthesized from tag names, so that pages with broken ARIA
//! still expose their controls.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use lookout_cdp::CdpSession;
use lookout_cdp::protocol::accessibility::{
    AXNode, AXValue, GetFullAXTreeParams, GetFullAXTreeResult, GetPartialAXTreeParams,
    GetPartialAXTreeResult,
};
use lookout_cdp::protocol::dom::BackendNodeId;

use crate::encoded_id::EncodedId;
use crate::error::CaptureError;

/// Roles that make a frame's tree worth keeping as-is.
const INTERACTIVE_ROLES: [&str; 7] = [
    "button",
    "link",
    "textbox",
    "searchbox",
    "combobox",
    "checkbox",
    "radio",
];

/// Fetch the full tree for a session's root frame.
pub(crate) async fn fetch_full_tree(session: &Arc<CdpSession>) -> Result<Vec<AXNode>, CaptureError> {
    let result: GetFullAXTreeResult = session
        .send_command(
            "Accessibility.getFullAXTree",
            Some(GetFullAXTreeParams::default()),
        )
        .await?;
    Ok(result.nodes)
}

/// Fetch a same-origin iframe's tree, anchored at its content document.
///
/// `fetchRelatives` pulls ancestors along; the result is filtered back
/// down to the content document's subtree.
pub(crate) async fn fetch_same_origin_tree(
    session: &Arc<CdpSession>,
    content_document_backend_node_id: BackendNodeId,
) -> Result<Vec<AXNode>, CaptureError> {
    let result: GetPartialAXTreeResult = session
        .send_command(
            "Accessibility.getPartialAXTree",
            Some(GetPartialAXTreeParams {
                backend_node_id: Some(content_document_backend_node_id),
                fetch_relatives: Some(true),
                ..Default::default()
            }),
        )
        .await?;
    Ok(subtree_of(
        result.nodes,
        content_document_backend_node_id,
    ))
}

/// Restrict a node list to the subtree rooted at the node backed by
/// `backend_node_id`. Falls back to the full list when the anchor is not
/// present (the browser already scoped the reply).
pub(crate) fn subtree_of(nodes: Vec<AXNode>, backend_node_id: BackendNodeId) -> Vec<AXNode> {
    let Some(root) = nodes
        .iter()
        .find(|node| node.backend_dom_node_id == Some(backend_node_id))
    else {
        return nodes;
    };

    let by_id: HashMap<&str, &AXNode> = nodes
        .iter()
        .map(|node| (node.node_id.as_str(), node))
        .collect();

    let mut keep: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(root.node_id.as_str());
    while let Some(id) = queue.pop_front() {
        if !keep.insert(id.to_string()) {
            continue;
        }
        if let Some(node) = by_id.get(id) {
            for child in node.child_ids.iter().flatten() {
                queue.push_back(child.as_str());
            }
        }
    }

    nodes
        .into_iter()
        .filter(|node| keep.contains(&node.node_id))
        .collect()
}

/// Whether any non-ignored node carries an interactive role.
pub(crate) fn has_interactive_roles(nodes: &[AXNode]) -> bool {
    nodes.iter().any(|node| {
        !node.ignored
            && node
                .role
                .as_ref()
                .and_then(AXValue::as_str)
                .is_some_and(|role| INTERACTIVE_ROLES.contains(&role))
    })
}

/// Synthesize a flat fallback tree from the DOM walk's tag names.
///
/// Used when a frame's AX tree comes back empty of interactive roles:
/// inputs become textboxes, buttons buttons, anchors links, selects
/// comboboxes. Names come from author-supplied attributes when present.
pub(crate) fn synthesize_dom_fallback(
    frame_index: u64,
    tag_name_map: &HashMap<EncodedId, String>,
    accessible_name_map: &HashMap<EncodedId, String>,
) -> Vec<AXNode> {
    let mut nodes: Vec<AXNode> = Vec::new();
    let mut entries: Vec<(&EncodedId, &String)> = tag_name_map
        .iter()
        .filter(|(id, _)| id.frame_index == frame_index)
        .collect();
    entries.sort_by_key(|(id, _)| **id);

    for (encoded_id, tag) in entries {
        let role = match tag.as_str() {
            "input" | "textarea" => "textbox",
            "button" => "button",
            "a" => "link",
            "select" => "combobox",
            _ => continue,
        };
        nodes.push(AXNode {
            node_id: format!("fallback-{encoded_id}"),
            ignored: false,
            role: Some(AXValue {
                value_type: "role".to_string(),
                value: Some(serde_json::json!(role)),
            }),
            name: accessible_name_map.get(encoded_id).map(|name| AXValue {
                value_type: "computedString".to_string(),
                value: Some(serde_json::json!(name)),
            }),
            description: None,
            value: None,
            properties: None,
            parent_id: None,
            child_ids: None,
            backend_dom_node_id: Some(encoded_id.backend_node_id as i64),
            frame_id: None,
        });
    }

    if !nodes.is_empty() {
        debug!(
            frame_index = frame_index,
            count = nodes.len(),
            "synthesized DOM fallback tree"
        );
    }
    nodes
}

/// Apply the fallback rule: keep the fetched tree when it is interactive,
/// otherwise synthesize.
pub(crate) fn with_fallback(
    fetched: Vec<AXNode>,
    frame_index: u64,
    tag_name_map: &HashMap<EncodedId, String>,
    accessible_name_map: &HashMap<EncodedId, String>,
) -> Vec<AXNode> {
    if has_interactive_roles(&fetched) {
        return fetched;
    }
    let fallback = synthesize_dom_fallback(frame_index, tag_name_map, accessible_name_map);
    if fallback.is_empty() { fetched } else { fallback }
}

#[cfg(test)]
mod tests;
