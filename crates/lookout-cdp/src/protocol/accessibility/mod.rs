//! Accessibility domain types.
//!
//! The Accessibility domain exposes Chrome's internal accessibility tree:
//! the post-ARIA, post-heuristics structure assistive technologies see.
//! AX node ids live in their own identifier space; `backend_dom_node_id`
//! is the bridge back to the DOM domain.

use serde::{Deserialize, Serialize};

use crate::protocol::dom::BackendNodeId;
use crate::protocol::page::FrameId;

/// Unique accessibility node identifier, scoped to a frame.
pub type AXNodeId = String;

/// A single computed accessibility property value.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AXValue {
    /// Type of this value ("string", "computedString", "role", ...).
    #[serde(rename = "type")]
    pub value_type: String,
    /// The computed value.
    pub value: Option<serde_json::Value>,
}

impl AXValue {
    /// The value as a string, when it is one.
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(serde_json::Value::as_str)
    }
}

/// A named accessibility property ("focusable", "hidden", ...).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AXProperty {
    /// Property name.
    pub name: String,
    /// Property value.
    pub value: AXValue,
}

/// A node in the accessibility tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AXNode {
    /// Unique node identifier.
    pub node_id: AXNodeId,
    /// Whether this node is ignored for accessibility.
    pub ignored: bool,
    /// This node's role.
    pub role: Option<AXValue>,
    /// The accessible name.
    pub name: Option<AXValue>,
    /// The accessible description.
    pub description: Option<AXValue>,
    /// The current value.
    pub value: Option<AXValue>,
    /// Related properties.
    pub properties: Option<Vec<AXProperty>>,
    /// Id of this node's parent.
    pub parent_id: Option<AXNodeId>,
    /// Ids of this node's children.
    pub child_ids: Option<Vec<AXNodeId>>,
    /// The backing DOM node, if any.
    #[serde(rename = "backendDOMNodeId")]
    pub backend_dom_node_id: Option<BackendNodeId>,
    /// The frame this node belongs to.
    pub frame_id: Option<FrameId>,
}

/// Parameters for Accessibility.getFullAXTree.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetFullAXTreeParams {
    /// Maximum tree depth; the whole tree when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<i64>,
    /// Frame to fetch for; the root frame of the session when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<FrameId>,
}

/// Result of Accessibility.getFullAXTree.
#[derive(Debug, Clone, Deserialize)]
pub struct GetFullAXTreeResult {
    /// Flattened tree, parents before children.
    pub nodes: Vec<AXNode>,
}

/// Parameters for Accessibility.getPartialAXTree.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetPartialAXTreeParams {
    /// Identifier of the DOM node to fetch for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<i64>,
    /// Backend identifier of the DOM node to fetch for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_node_id: Option<BackendNodeId>,
    /// JavaScript object id of the node wrapper.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Whether to also fetch ancestors, siblings and children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_relatives: Option<bool>,
}

/// Result of Accessibility.getPartialAXTree.
#[derive(Debug, Clone, Deserialize)]
pub struct GetPartialAXTreeResult {
    /// Nodes of the partial tree.
    pub nodes: Vec<AXNode>,
}

#[cfg(test)]
mod tests;
