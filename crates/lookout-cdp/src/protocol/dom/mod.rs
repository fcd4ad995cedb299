//! DOM domain types.
//!
//! The DOM domain exposes DOM read operations and node addressing. The
//! engine leans on backend node ids: per-document, session-stable
//! identifiers that survive attribute mutation but not element
//! recreation.

use serde::{Deserialize, Serialize};

use crate::protocol::page::FrameId;
use crate::protocol::runtime::{ExecutionContextId, RemoteObject};

/// Unique DOM node identifier (front-end allocated).
pub type NodeId = i64;

/// Per-document node identifier that may reference nodes never pushed to
/// the front-end.
pub type BackendNodeId = i64;

/// DOM node as returned by DOM.getDocument.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Node identifier.
    pub node_id: NodeId,
    /// Backend node identifier.
    pub backend_node_id: BackendNodeId,
    /// Node's nodeType (1 = element, 3 = text, 9 = document).
    pub node_type: i64,
    /// Node's nodeName (upper-case for elements).
    pub node_name: String,
    /// Node's localName.
    pub local_name: String,
    /// Node's nodeValue.
    pub node_value: String,
    /// Child nodes when requested.
    pub children: Option<Vec<Node>>,
    /// Element attributes as a flat name/value array.
    pub attributes: Option<Vec<String>>,
    /// Content document for frame owner elements (same-origin only).
    pub content_document: Option<Box<Node>>,
    /// Shadow roots hosted by this element.
    pub shadow_roots: Option<Vec<Node>>,
    /// Frame ID for frame owner elements.
    pub frame_id: Option<FrameId>,
}

impl Node {
    /// Look up an attribute value by name.
    ///
    /// Attributes arrive as a flat `[name, value, name, value, ...]`
    /// array.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        let attrs = self.attributes.as_ref()?;
        attrs
            .chunks_exact(2)
            .find(|pair| pair[0].eq_ignore_ascii_case(name))
            .map(|pair| pair[1].as_str())
    }

    /// Whether this is an element node.
    pub fn is_element(&self) -> bool {
        self.node_type == 1
    }
}

/// Parameters for DOM.getDocument.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetDocumentParams {
    /// Maximum depth to retrieve; -1 for the entire subtree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<i64>,
    /// Whether to traverse iframes and shadow roots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pierce: Option<bool>,
}

/// Result of DOM.getDocument.
#[derive(Debug, Clone, Deserialize)]
pub struct GetDocumentResult {
    /// Resulting document node.
    pub root: Node,
}

/// Parameters for DOM.getFrameOwner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFrameOwnerParams {
    /// Frame whose owning element is requested.
    pub frame_id: FrameId,
}

/// Result of DOM.getFrameOwner.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFrameOwnerResult {
    /// Backend node id of the owning iframe element.
    pub backend_node_id: BackendNodeId,
    /// Front-end node id, present when the document was requested.
    pub node_id: Option<NodeId>,
}

/// Parameters for DOM.resolveNode.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResolveNodeParams {
    /// Id of the node to resolve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Backend identifier of the node to resolve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_node_id: Option<BackendNodeId>,
    /// Symbolic group name for released-together objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_group: Option<String>,
    /// Execution context in which to resolve the node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_context_id: Option<ExecutionContextId>,
}

/// Result of DOM.resolveNode.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveNodeResult {
    /// JavaScript object wrapper for the node.
    pub object: RemoteObject,
}

/// Parameters for DOM.describeNode.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DescribeNodeParams {
    /// Identifier of the node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Identifier of the backend node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_node_id: Option<BackendNodeId>,
    /// JavaScript object id of the node wrapper.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Maximum depth to retrieve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<i64>,
}

/// Result of DOM.describeNode.
#[derive(Debug, Clone, Deserialize)]
pub struct DescribeNodeResult {
    /// Node description.
    pub node: Node,
}

/// Parameters for DOM.getBoxModel.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetBoxModelParams {
    /// Identifier of the node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Identifier of the backend node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_node_id: Option<BackendNodeId>,
    /// JavaScript object id of the node wrapper.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

/// Box model of an element.
///
/// Each quad is eight numbers: x/y pairs for the four corners in
/// clockwise order starting top-left.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxModel {
    /// Content box quad.
    pub content: Vec<f64>,
    /// Padding box quad.
    pub padding: Vec<f64>,
    /// Border box quad.
    pub border: Vec<f64>,
    /// Margin box quad.
    pub margin: Vec<f64>,
    /// Node width.
    pub width: f64,
    /// Node height.
    pub height: f64,
}

/// Result of DOM.getBoxModel.
#[derive(Debug, Clone, Deserialize)]
pub struct GetBoxModelResult {
    /// Box model for the node.
    pub model: BoxModel,
}

/// Parameters for DOM.scrollIntoViewIfNeeded.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScrollIntoViewIfNeededParams {
    /// Identifier of the node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Identifier of the backend node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_node_id: Option<BackendNodeId>,
    /// JavaScript object id of the node wrapper.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

#[cfg(test)]
mod tests;
