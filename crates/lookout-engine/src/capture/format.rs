//! Pass 7: merge and format.
//!
//! Renders the kept trees into the single text listing the model reads:
//! one line per node, indented by depth, each frame under a header that
//! spells out its ancestry.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::encoded_id::EncodedId;
use crate::snapshot::IframeInfo;

use super::tree::CleanNode;

/// Render the full listing: main frame first, child frames in index
/// order, blank-line separated.
pub(crate) fn format_snapshot(
    trees: &BTreeMap<u64, Vec<CleanNode>>,
    frame_map: &BTreeMap<u64, IframeInfo>,
) -> String {
    let mut sections = Vec::new();
    for (&frame_index, roots) in trees {
        let mut section = String::new();
        section.push_str(&frame_header(frame_index, frame_map));
        section.push('\n');
        for root in roots {
            format_node(root, 0, &mut section);
        }
        sections.push(section);
    }
    sections.join("\n")
}

/// `=== Frame 0 (Main) ===` or `=== Frame 3 (Main → Frame 1 → Frame 3) ===`.
fn frame_header(frame_index: u64, frame_map: &BTreeMap<u64, IframeInfo>) -> String {
    if frame_index == 0 {
        return "=== Frame 0 (Main) ===".to_string();
    }
    let mut chain = vec![frame_index];
    let mut cursor = frame_index;
    while let Some(parent) = frame_map.get(&cursor).and_then(|info| info.parent_frame_index) {
        if parent == 0 {
            break;
        }
        // A parent missing from the map would loop forever; bail out.
        if chain.contains(&parent) {
            break;
        }
        chain.push(parent);
        cursor = parent;
    }
    chain.reverse();
    let path: Vec<String> = std::iter::once("Main".to_string())
        .chain(chain.iter().map(|i| format!("Frame {i}")))
        .collect();
    format!("=== Frame {frame_index} ({}) ===", path.join(" → "))
}

fn format_node(node: &CleanNode, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push('[');
    out.push_str(&node.encoded_id.to_string());
    out.push_str("] ");
    out.push_str(&node.role);
    if let Some(name) = &node.name {
        out.push_str(": ");
        out.push_str(name);
    }
    out.push('\n');
    for child in &node.children {
        format_node(child, depth + 1, out);
    }
}

static LINE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\[(\d+-\d+)\]").expect("static pattern"));

/// Recover the set of encoded ids a formatted listing was built from.
///
/// This is the inverse the listing guarantees: every kept node produced
/// exactly one `[id]`-prefixed line.
pub fn parse_encoded_ids(formatted: &str) -> std::collections::BTreeSet<EncodedId> {
    LINE_ID
        .captures_iter(formatted)
        .filter_map(|captures| captures[1].parse().ok())
        .collect()
}
