//! Pass 5: scrollable-element detection.
//!
//! A one-shot probe runs in each frame's context, finds elements whose
//! overflow genuinely scrolls (it nudges `scrollTop` and puts it back),
//! orders them by scroll height descending, and reports their XPaths.
//! The XPaths are generated with the same formula as the DOM walk, so
//! resolving them back to backend node ids is a map lookup.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use lookout_cdp::CdpSession;
use lookout_cdp::protocol::dom::BackendNodeId;
use lookout_cdp::protocol::runtime::{EvaluateParams, EvaluateResult, ExecutionContextId};

use crate::encoded_id::EncodedId;
use crate::error::CaptureError;

/// The probe script. Returns a JSON array of XPaths, largest scroll
/// height first. XPath generation mirrors the capture walk: `id`
/// attributes anchor the path, positional predicates appear only among
/// like-named siblings.
const SCROLLABLE_PROBE: &str = r#"
(() => {
  const xpathFor = (el) => {
    const parts = [];
    let cur = el;
    while (cur && cur.nodeType === 1) {
      const tag = cur.tagName.toLowerCase();
      if (cur.id) {
        parts.unshift(`//${tag}[@id="${cur.id}"]`);
        return parts.join("");
      }
      let suffix = "";
      const parent = cur.parentElement;
      if (parent) {
        const same = Array.from(parent.children).filter(c => c.tagName === cur.tagName);
        if (same.length > 1) suffix = `[${same.indexOf(cur) + 1}]`;
      }
      parts.unshift(`/${tag}${suffix}`);
      cur = parent;
    }
    return parts.join("");
  };

  const genuinelyScrolls = (el) => {
    if (el.scrollHeight <= el.clientHeight + 1) return false;
    const overflow = getComputedStyle(el).overflowY;
    if (el !== document.scrollingElement &&
        overflow !== "auto" && overflow !== "scroll" && overflow !== "overlay") {
      return false;
    }
    const before = el.scrollTop;
    el.scrollTop = before + 1;
    const moved = el.scrollTop !== before;
    el.scrollTop = before;
    return moved;
  };

  const found = [];
  const all = [document.scrollingElement, ...document.querySelectorAll("*")];
  for (const el of all) {
    if (el && el.nodeType === 1 && genuinelyScrolls(el) && !found.includes(el)) {
      found.push(el);
    }
  }
  found.sort((a, b) => b.scrollHeight - a.scrollHeight);
  return JSON.stringify(found.map(xpathFor));
})()
"#;

/// Run the probe in one frame's context and return the scrollable
/// backend node ids, resolved through the frame's XPath map.
pub(crate) async fn detect_scrollables(
    session: &Arc<CdpSession>,
    context_id: Option<ExecutionContextId>,
    frame_index: u64,
    xpath_map: &HashMap<EncodedId, String>,
) -> Result<HashSet<BackendNodeId>, CaptureError> {
    let result: EvaluateResult = session
        .send_command(
            "Runtime.evaluate",
            Some(EvaluateParams {
                expression: SCROLLABLE_PROBE.to_string(),
                silent: Some(true),
                context_id,
                return_by_value: Some(true),
                ..Default::default()
            }),
        )
        .await?;

    if let Some(exception) = result.exception_details {
        debug!(frame_index = frame_index, error = %exception.text, "scrollable probe threw");
        return Ok(HashSet::new());
    }

    let xpaths: Vec<String> = result
        .result
        .value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();

    trace!(frame_index = frame_index, count = xpaths.len(), "scrollable xpaths");
    Ok(resolve_xpaths(&xpaths, frame_index, xpath_map))
}

/// Resolve probe XPaths to backend node ids through the walk's map.
///
/// Unmatched XPaths (elements the walk never recorded, or formula drift)
/// are dropped; a decoration miss is benign.
pub(crate) fn resolve_xpaths(
    xpaths: &[String],
    frame_index: u64,
    xpath_map: &HashMap<EncodedId, String>,
) -> HashSet<BackendNodeId> {
    let reverse: HashMap<&str, &EncodedId> = xpath_map
        .iter()
        .filter(|(id, _)| id.frame_index == frame_index)
        .map(|(id, xpath)| (xpath.as_str(), id))
        .collect();

    xpaths
        .iter()
        .filter_map(|xpath| reverse.get(xpath.as_str()))
        .map(|id| id.backend_node_id as i64)
        .collect()
}

#[cfg(test)]
mod tests;
