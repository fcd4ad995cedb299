//! Pass 1: depth-first DOM traversal.
//!
//! Walks a `DOM.getDocument` tree and builds the per-element maps keyed
//! by encoded id: tag names, backend node ids, XPaths, and author-supplied
//! accessible names. `<iframe>` elements allocate the next depth-first
//! frame index; same-origin content documents are recursed into, OOPIFs
//! leave only the outer element entry behind.

use std::collections::HashMap;

use lookout_cdp::protocol::dom::{BackendNodeId, Node};

use crate::encoded_id::EncodedId;
use crate::snapshot::IframeInfo;

/// Accumulated output of the DOM walk across all frames.
#[derive(Debug, Default)]
pub(crate) struct DomMaps {
    pub tag_name_map: HashMap<EncodedId, String>,
    pub backend_node_map: HashMap<EncodedId, BackendNodeId>,
    pub xpath_map: HashMap<EncodedId, String>,
    pub accessible_name_map: HashMap<EncodedId, String>,
    pub iframes: Vec<IframeInfo>,
}

impl DomMaps {
    /// Merge another walk's output (an OOPIF's) into this one.
    pub(crate) fn merge(&mut self, other: DomMaps) {
        self.tag_name_map.extend(other.tag_name_map);
        self.backend_node_map.extend(other.backend_node_map);
        self.xpath_map.extend(other.xpath_map);
        self.accessible_name_map.extend(other.accessible_name_map);
        self.iframes.extend(other.iframes);
    }
}

/// Walk one frame's document tree.
///
/// `frame_index` addresses the document being walked; `next_frame_index`
/// is the allocator for iframes discovered along the way and is advanced
/// in depth-first encounter order.
pub(crate) fn walk_document(
    root: &Node,
    frame_index: u64,
    next_frame_index: &mut u64,
    maps: &mut DomMaps,
) {
    walk_children(root, frame_index, "", next_frame_index, maps);
}

fn walk_children(
    parent: &Node,
    frame_index: u64,
    parent_path: &str,
    next_frame_index: &mut u64,
    maps: &mut DomMaps,
) {
    let Some(children) = &parent.children else {
        return;
    };

    // Positional predicates count like-named element siblings.
    let mut tag_totals: HashMap<&str, usize> = HashMap::new();
    for child in children.iter().filter(|c| c.is_element()) {
        *tag_totals.entry(child.local_name.as_str()).or_default() += 1;
    }

    let mut tag_seen: HashMap<&str, usize> = HashMap::new();
    let mut iframe_ordinal = 0usize;

    for child in children.iter().filter(|c| c.is_element()) {
        let tag = child.local_name.as_str();
        let seen = tag_seen.entry(tag).or_default();
        *seen += 1;

        let xpath = if let Some(id) = child.attribute("id") {
            // An id shortcuts the whole ancestry.
            format!("//{tag}[@id=\"{id}\"]")
        } else if tag_totals[tag] > 1 {
            format!("{parent_path}/{tag}[{seen}]")
        } else {
            format!("{parent_path}/{tag}")
        };

        record_element(child, frame_index, &xpath, maps);

        if tag == "iframe" || tag == "frame" {
            iframe_ordinal += 1;
            let child_index = *next_frame_index;
            *next_frame_index += 1;

            maps.iframes.push(IframeInfo {
                frame_index: child_index,
                parent_frame_index: Some(frame_index),
                iframe_backend_node_id: child.backend_node_id,
                content_document_backend_node_id: child
                    .content_document
                    .as_ref()
                    .map(|doc| doc.backend_node_id),
                xpath: xpath.clone(),
                src: child.attribute("src").map(ToString::to_string),
                name: child.attribute("name").map(ToString::to_string),
                sibling_position: iframe_ordinal,
                frame_id: child.frame_id.clone(),
                execution_context_id: None,
                cdp_session_id: None,
                is_oopif: child.content_document.is_none(),
                absolute_bounding_box: None,
                frame_path: None,
            });

            // Same-origin content documents are part of the pierced tree.
            if let Some(doc) = &child.content_document {
                walk_document(doc, child_index, next_frame_index, maps);
            }
        } else {
            walk_children(child, frame_index, &xpath, next_frame_index, maps);
        }
    }
}

fn record_element(node: &Node, frame_index: u64, xpath: &str, maps: &mut DomMaps) {
    let encoded = EncodedId::new(frame_index, node.backend_node_id as u64);
    maps.tag_name_map.insert(encoded, node.local_name.clone());
    maps.backend_node_map.insert(encoded, node.backend_node_id);
    maps.xpath_map.insert(encoded, xpath.to_string());

    // Author-supplied names are a fallback for frames whose AX tree
    // arrives empty.
    let accessible_name = node
        .attribute("aria-label")
        .or_else(|| node.attribute("title"))
        .or_else(|| node.attribute("placeholder"));
    if let Some(name) = accessible_name {
        if !name.trim().is_empty() {
            maps.accessible_name_map.insert(encoded, name.to_string());
        }
    }
}
