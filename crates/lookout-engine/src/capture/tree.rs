//! Pass 6: hierarchical tree build and cleaning.
//!
//! Converts one frame's raw AX nodes into the kept tree the model sees:
//! scrollable-role decoration, structural-wrapper collapsing, redundant
//! text pruning, and name normalization. Everything here is pure.

use std::collections::{BTreeMap, HashMap, HashSet};

use lookout_cdp::protocol::accessibility::{AXNode, AXValue};
use lookout_cdp::protocol::dom::BackendNodeId;

use crate::encoded_id::EncodedId;
use crate::snapshot::AccessibilityNode;

/// A kept node with nested children, pre-flattening.
#[derive(Debug, Clone)]
pub(crate) struct CleanNode {
    pub encoded_id: EncodedId,
    pub role: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub value: Option<String>,
    pub backend_node_id: BackendNodeId,
    pub children: Vec<CleanNode>,
}

/// Inputs for building one frame's tree.
pub(crate) struct TreeBuild<'a> {
    pub frame_index: u64,
    /// Backend node ids with scrollable overflow in this frame.
    pub scrollable: &'a HashSet<BackendNodeId>,
    /// Tag names from the DOM walk, for structural-wrapper replacement.
    pub tag_name_map: &'a HashMap<EncodedId, String>,
}

/// Roles that carry no semantics of their own.
fn is_structural(role: &str) -> bool {
    matches!(role, "generic" | "none" | "presentation")
}

/// Normalize an accessible name: trim, collapse non-breaking-space
/// variants to plain spaces, strip private-use unicode.
pub(crate) fn normalize_name(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '\u{a0}' | '\u{202f}' | '\u{2007}' | '\u{2060}' => ' ',
            other => other,
        })
        .filter(|c| !('\u{e000}'..='\u{f8ff}').contains(c))
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Apply the scrollable decoration, keeping the prefix monotonic: a
/// scrollable node's displayed role always begins with `scrollable`.
fn decorate_role(role: &str, scrollable: bool) -> String {
    if !scrollable {
        return role.to_string();
    }
    if is_structural(role) {
        "scrollable".to_string()
    } else {
        format!("scrollable, {role}")
    }
}

impl TreeBuild<'_> {
    /// Build the cleaned tree for one frame.
    ///
    /// `nodes` is the flat AX list with intra-frame parent/child wiring
    /// by AX node id; roots are nodes whose parent is absent from the
    /// list.
    pub(crate) fn build(&self, nodes: &[AXNode]) -> Vec<CleanNode> {
        let by_id: HashMap<&str, &AXNode> = nodes
            .iter()
            .map(|node| (node.node_id.as_str(), node))
            .collect();

        let referenced: HashSet<&str> = nodes
            .iter()
            .flat_map(|node| node.child_ids.iter().flatten())
            .map(String::as_str)
            .collect();

        let mut roots = Vec::new();
        for node in nodes {
            let is_root = match &node.parent_id {
                Some(parent) => !by_id.contains_key(parent.as_str()),
                None => !referenced.contains(node.node_id.as_str()),
            };
            if is_root {
                roots.extend(self.convert(node, &by_id));
            }
        }
        roots
    }

    /// Convert one AX node into zero or more kept nodes.
    fn convert(&self, node: &AXNode, by_id: &HashMap<&str, &AXNode>) -> Vec<CleanNode> {
        let mut children = Vec::new();
        for child_id in node.child_ids.iter().flatten() {
            if let Some(child) = by_id.get(child_id.as_str()) {
                children.extend(self.convert(child, by_id));
            }
        }

        let raw_role = node
            .role
            .as_ref()
            .and_then(AXValue::as_str)
            .unwrap_or("generic");

        // Ignored nodes and text fragments dissolve into their children.
        if node.ignored || raw_role == "InlineTextBox" {
            return children;
        }

        let Some(backend_node_id) = node.backend_dom_node_id else {
            // Unaddressable wrapper; its children stand on their own.
            return children;
        };

        let encoded_id = EncodedId::new(self.frame_index, backend_node_id as u64);
        let name = node
            .name
            .as_ref()
            .and_then(AXValue::as_str)
            .and_then(normalize_name);
        let scrollable = self.scrollable.contains(&backend_node_id);

        let mut role = raw_role.to_string();

        // A combobox backed by a real <select> reads better as one.
        if role == "combobox"
            && self.tag_name_map.get(&encoded_id).map(String::as_str) == Some("select")
        {
            role = "select".to_string();
        }

        if is_structural(&role) && !scrollable {
            // Structural wrappers: collapse through single children,
            // prune leaves, and only survive a fan-out by borrowing
            // their HTML tag name.
            match children.len() {
                0 => return Vec::new(),
                1 => return children,
                _ => {
                    role = self
                        .tag_name_map
                        .get(&encoded_id)
                        .cloned()
                        .unwrap_or_else(|| "div".to_string());
                }
            }
        }

        let role = decorate_role(&role, scrollable);

        // A sole StaticText child repeating the parent's name adds
        // nothing.
        if children.len() == 1
            && children[0].role == "StaticText"
            && children[0].name == name
            && children[0].children.is_empty()
        {
            children.clear();
        }

        let keep = name.is_some() || !children.is_empty() || !is_structural(raw_role) || scrollable;
        if !keep {
            return children;
        }

        vec![CleanNode {
            encoded_id,
            role,
            name,
            description: node
                .description
                .as_ref()
                .and_then(AXValue::as_str)
                .and_then(normalize_name),
            value: node
                .value
                .as_ref()
                .and_then(|v| v.value.as_ref())
                .map(|v| match v.as_str() {
                    Some(s) => s.to_string(),
                    None => v.to_string(),
                }),
            backend_node_id,
            children,
        }]
    }
}

/// Flatten a frame's kept trees into the snapshot's element map.
pub(crate) fn collect_elements(
    roots: &[CleanNode],
    elements: &mut BTreeMap<EncodedId, AccessibilityNode>,
) {
    for node in roots {
        let children_ids: Vec<EncodedId> = node.children.iter().map(|c| c.encoded_id).collect();
        elements.insert(
            node.encoded_id,
            AccessibilityNode {
                role: node.role.clone(),
                name: node.name.clone(),
                description: node.description.clone(),
                value: node.value.clone(),
                backend_dom_node_id: node.backend_node_id,
                children: if children_ids.is_empty() {
                    None
                } else {
                    Some(children_ids)
                },
            },
        );
        collect_elements(&node.children, elements);
    }
}
