//! CDP action dispatch.
//!
//! Every method follows the same protocol: resolve the element, make
//! sure it is in view, execute through Input/Runtime/DOM primitives,
//! then wait for the DOM to settle and mark the snapshot dirty.

use std::sync::Arc;

use tracing::{debug, instrument};

use lookout_cdp::CdpSession;
use lookout_cdp::protocol::dom::{
    GetBoxModelParams, GetBoxModelResult, ScrollIntoViewIfNeededParams,
};
use lookout_cdp::protocol::input::{
    DispatchKeyEventParams, DispatchMouseEventParams, InsertTextParams, KeyEventType, MouseButton,
    MouseEventType,
};
use lookout_cdp::protocol::runtime::{
    CallArgument, CallFunctionOnParams, CallFunctionOnResult,
};

use crate::config::EngineConfig;
use crate::driver::Page;
use crate::encoded_id::EncodedId;
use crate::error::ActionError;
use crate::frame_graph::FrameGraph;
use crate::resolver::{self, ResolvedNode};
use crate::settle;
use crate::snapshot::Snapshot;

use super::{Action, ActionOutcome, keys};

const FOCUS_FN: &str = "function() { this.focus(); }";

const SET_VALUE_FN: &str = r#"function(value) {
  this.value = value;
  this.dispatchEvent(new Event("input", { bubbles: true }));
  this.dispatchEvent(new Event("change", { bubbles: true }));
}"#;

const SELECT_OPTION_FN: &str = r#"function(option) {
  let matched = null;
  for (const candidate of this.options) {
    if (candidate.value === option) { matched = candidate; break; }
  }
  if (!matched) {
    for (const candidate of this.options) {
      if (candidate.text.trim() === option.trim()) { matched = candidate; break; }
    }
  }
  if (!matched) return false;
  matched.selected = true;
  this.dispatchEvent(new Event("change", { bubbles: true }));
  return true;
}"#;

const SET_CHECKED_FN: &str = r#"function(checked) {
  if (this.checked !== checked) {
    this.checked = checked;
    this.dispatchEvent(new Event("change", { bubbles: true }));
    this.dispatchEvent(new Event("input", { bubbles: true }));
  }
}"#;

/// Smooth-scrolls and resolves once the position is stable for three
/// consecutive frames (sub-pixel delta), or after an internal ceiling.
const SCROLL_TO_PERCENT_FN: &str = r#"function(percent) {
  const target = (this === document.documentElement || this === document.body)
    ? (document.scrollingElement || document.documentElement)
    : this;
  const top = (target.scrollHeight - target.clientHeight) * (percent / 100);
  target.scrollTo({ top: top, behavior: "smooth" });
  return new Promise((resolve) => {
    let last = target.scrollTop;
    let stable = 0;
    const started = Date.now();
    const tick = () => {
      const now = target.scrollTop;
      if (Math.abs(now - last) < 1) { stable += 1; } else { stable = 0; }
      last = now;
      if (stable >= 3 || Date.now() - started > 3000) { resolve(now); return; }
      requestAnimationFrame(tick);
    };
    requestAnimationFrame(tick);
  });
}"#;

/// Scrolls the nearest scrollable ancestor (or the document) by one
/// viewport height in the given direction.
const SCROLL_CHUNK_FN: &str = r#"function(direction) {
  let target = this;
  while (target && target !== document.body && target !== document.documentElement) {
    const style = getComputedStyle(target);
    if (target.scrollHeight > target.clientHeight + 1 &&
        (style.overflowY === "auto" || style.overflowY === "scroll" || style.overflowY === "overlay")) {
      break;
    }
    target = target.parentElement;
  }
  if (!target || target === document.body || target === document.documentElement) {
    target = document.scrollingElement || document.documentElement;
  }
  const viewport = (target === document.scrollingElement || target === document.documentElement)
    ? window.innerHeight
    : target.clientHeight;
  target.scrollBy({ top: direction * viewport, behavior: "smooth" });
  return new Promise((resolve) => {
    let last = target.scrollTop;
    let stable = 0;
    const started = Date.now();
    const tick = () => {
      const now = target.scrollTop;
      if (Math.abs(now - last) < 1) { stable += 1; } else { stable = 0; }
      last = now;
      if (stable >= 3 || Date.now() - started > 3000) { resolve(now); return; }
      requestAnimationFrame(tick);
    };
    requestAnimationFrame(tick);
  });
}"#;

/// Dispatch one action against a resolved element.
///
/// # Errors
///
/// Action-local failures (timeout, not interactable, stale element) come
/// back as errors the engine converts to `{ok: false}`; structural and
/// fatal failures propagate.
#[instrument(level = "debug", skip_all, fields(encoded_id = %encoded_id, method = action.method_name()))]
pub(crate) async fn execute(
    page: &Page,
    graph: &FrameGraph,
    snapshot: &Snapshot,
    config: &EngineConfig,
    encoded_id: &str,
    action: &Action,
) -> Result<ActionOutcome, ActionError> {
    if !config.cdp_actions {
        return super::fallback::execute_via_xpath(page, graph, snapshot, config, encoded_id, action)
            .await;
    }

    let resolved = resolver::resolve(encoded_id, snapshot, graph, config).await?;

    scroll_into_view(&resolved).await?;

    match action {
        Action::Click => {
            let (x, y) = click_point(snapshot, encoded_id, &resolved).await?;
            let sequence = async {
                dispatch_mouse(&resolved.session, MouseEventType::Moved, x, y, None).await?;
                dispatch_mouse(
                    &resolved.session,
                    MouseEventType::Pressed,
                    x,
                    y,
                    Some((MouseButton::Left, 1)),
                )
                .await?;
                dispatch_mouse(
                    &resolved.session,
                    MouseEventType::Released,
                    x,
                    y,
                    Some((MouseButton::Left, 1)),
                )
                .await
            };
            tokio::time::timeout(config.click_timeout, sequence)
                .await
                .map_err(|_| ActionError::Timeout {
                    method: "click".to_string(),
                    budget: config.click_timeout,
                })??;
        }
        Action::Hover => {
            let (x, y) = click_point(snapshot, encoded_id, &resolved).await?;
            dispatch_mouse(&resolved.session, MouseEventType::Moved, x, y, None).await?;
        }
        Action::Fill { value } => {
            call_on(&resolved, FOCUS_FN, vec![], false).await?;
            call_on(
                &resolved,
                SET_VALUE_FN,
                vec![serde_json::json!(value)],
                false,
            )
            .await?;
        }
        Action::Type { text, press_enter } => {
            call_on(&resolved, FOCUS_FN, vec![], false).await?;
            resolved
                .session
                .send_command::<_, serde_json::Value>(
                    "Input.insertText",
                    Some(InsertTextParams { text: text.clone() }),
                )
                .await?;
            if *press_enter {
                press_key(&resolved.session, "Enter").await?;
            }
        }
        Action::Press { key } => {
            press_key(&resolved.session, key).await?;
        }
        Action::SelectOptionFromDropdown { option } => {
            let result = call_on(
                &resolved,
                SELECT_OPTION_FN,
                vec![serde_json::json!(option)],
                true,
            )
            .await?;
            if result.as_ref().and_then(serde_json::Value::as_bool) != Some(true) {
                return Err(ActionError::NotInteractable(format!(
                    "no option matching {option:?}"
                )));
            }
        }
        Action::Check => {
            call_on(&resolved, SET_CHECKED_FN, vec![serde_json::json!(true)], false).await?;
        }
        Action::Uncheck => {
            call_on(&resolved, SET_CHECKED_FN, vec![serde_json::json!(false)], false).await?;
        }
        Action::ScrollToElement => {
            // Already brought into view above; done.
        }
        Action::ScrollToPercentage { percent } => {
            call_on_awaiting(
                &resolved,
                SCROLL_TO_PERCENT_FN,
                vec![serde_json::json!(percent)],
            )
            .await?;
        }
        Action::NextChunk => {
            call_on_awaiting(&resolved, SCROLL_CHUNK_FN, vec![serde_json::json!(1)]).await?;
        }
        Action::PrevChunk => {
            call_on_awaiting(&resolved, SCROLL_CHUNK_FN, vec![serde_json::json!(-1)]).await?;
        }
    }

    let settle_reason = if action.is_mutating() {
        let reason = settle::wait_for_settled_dom(page, config).await?;
        snapshot.mark_dirty();
        Some(reason)
    } else {
        None
    };

    debug!(settle = ?settle_reason, "action complete");
    Ok(ActionOutcome::ok(
        format!("{} on {encoded_id}", action.method_name()),
        settle_reason,
    ))
}

/// `DOM.scrollIntoViewIfNeeded`, mapping layout-less nodes to
/// not-interactable.
async fn scroll_into_view(resolved: &ResolvedNode) -> Result<(), ActionError> {
    let result: Result<serde_json::Value, _> = resolved
        .session
        .send_command(
            "DOM.scrollIntoViewIfNeeded",
            Some(ScrollIntoViewIfNeededParams {
                backend_node_id: Some(resolved.backend_node_id),
                ..Default::default()
            }),
        )
        .await;
    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            let message = e.to_string();
            if message.contains("layout object") || message.contains("not visible") {
                Err(ActionError::NotInteractable(message))
            } else {
                Err(ActionError::Cdp(e))
            }
        }
    }
}

/// Compute the pointer target for click/hover.
///
/// Prefers the snapshot's viewport-absolute box (translated back into
/// the element's own frame when needed); falls back to the center of the
/// border quad from `DOM.getBoxModel`, which is frame-local like the
/// input space of the element's session.
async fn click_point(
    snapshot: &Snapshot,
    encoded_id: &str,
    resolved: &ResolvedNode,
) -> Result<(f64, f64), ActionError> {
    if let Ok(id) = encoded_id.parse::<EncodedId>() {
        if let Some(boxes) = &snapshot.bounding_box_map {
            if let Some(rect) = boxes.get(&id) {
                let (mut x, mut y) = rect.center();
                if id.frame_index != 0 {
                    match snapshot
                        .frame_map
                        .get(&id.frame_index)
                        .and_then(|info| info.absolute_bounding_box)
                    {
                        Some(frame_box) => {
                            x -= frame_box.x;
                            y -= frame_box.y;
                        }
                        // Unknown offset: the box model is authoritative.
                        None => return box_model_center(resolved).await,
                    }
                }
                return Ok((x, y));
            }
        }
    }
    box_model_center(resolved).await
}

async fn box_model_center(resolved: &ResolvedNode) -> Result<(f64, f64), ActionError> {
    let result: Result<GetBoxModelResult, _> = resolved
        .session
        .send_command(
            "DOM.getBoxModel",
            Some(GetBoxModelParams {
                backend_node_id: Some(resolved.backend_node_id),
                ..Default::default()
            }),
        )
        .await;
    match result {
        Ok(model) => quad_center(&model.model.border).ok_or_else(|| {
            ActionError::NotInteractable("degenerate border quad".to_string())
        }),
        Err(e) => {
            let message = e.to_string();
            if message.contains("Could not compute box model") {
                Err(ActionError::NotInteractable(message))
            } else {
                Err(ActionError::Cdp(e))
            }
        }
    }
}

/// Center of an eight-number quad.
pub(crate) fn quad_center(quad: &[f64]) -> Option<(f64, f64)> {
    if quad.len() != 8 {
        return None;
    }
    let xs = [quad[0], quad[2], quad[4], quad[6]];
    let ys = [quad[1], quad[3], quad[5], quad[7]];
    let x = xs.iter().sum::<f64>() / 4.0;
    let y = ys.iter().sum::<f64>() / 4.0;
    if xs.iter().all(|v| (v - xs[0]).abs() < f64::EPSILON)
        || ys.iter().all(|v| (v - ys[0]).abs() < f64::EPSILON)
    {
        // Zero-area quad: no interactable point.
        return None;
    }
    Some((x, y))
}

async fn dispatch_mouse(
    session: &Arc<CdpSession>,
    event_type: MouseEventType,
    x: f64,
    y: f64,
    button: Option<(MouseButton, i64)>,
) -> Result<(), ActionError> {
    let mut params = DispatchMouseEventParams::at(event_type, x, y);
    if let Some((button, click_count)) = button {
        params.button = Some(button);
        params.click_count = Some(click_count);
    }
    session
        .send_command::<_, serde_json::Value>("Input.dispatchMouseEvent", Some(params))
        .await?;
    Ok(())
}

/// keyDown + keyUp pair for a named key.
pub(crate) async fn press_key(session: &Arc<CdpSession>, key: &str) -> Result<(), ActionError> {
    let def = keys::lookup(key)
        .ok_or_else(|| ActionError::BadRequest(format!("unknown key {key:?}")))?;
    for event_type in [KeyEventType::KeyDown, KeyEventType::KeyUp] {
        let text = match event_type {
            KeyEventType::KeyDown => def.text.clone(),
            _ => None,
        };
        session
            .send_command::<_, serde_json::Value>(
                "Input.dispatchKeyEvent",
                Some(DispatchKeyEventParams {
                    event_type,
                    key: Some(def.key.clone()),
                    code: Some(def.code.clone()),
                    text,
                    windows_virtual_key_code: Some(def.key_code),
                    native_virtual_key_code: Some(def.key_code),
                    modifiers: None,
                }),
            )
            .await?;
    }
    Ok(())
}

/// `Runtime.callFunctionOn` against the resolved object.
async fn call_on(
    resolved: &ResolvedNode,
    function: &str,
    arguments: Vec<serde_json::Value>,
    return_value: bool,
) -> Result<Option<serde_json::Value>, ActionError> {
    let result: CallFunctionOnResult = resolved
        .session
        .send_command(
            "Runtime.callFunctionOn",
            Some(CallFunctionOnParams {
                function_declaration: function.to_string(),
                object_id: Some(resolved.object_id.clone()),
                arguments: Some(
                    arguments
                        .into_iter()
                        .map(|value| CallArgument {
                            value: Some(value),
                            object_id: None,
                        })
                        .collect(),
                ),
                return_by_value: Some(return_value),
                ..Default::default()
            }),
        )
        .await?;
    if let Some(exception) = result.exception_details {
        return Err(ActionError::NotInteractable(exception.text));
    }
    Ok(result.result.value)
}

/// `callFunctionOn` that awaits the returned promise (scroll stability).
async fn call_on_awaiting(
    resolved: &ResolvedNode,
    function: &str,
    arguments: Vec<serde_json::Value>,
) -> Result<(), ActionError> {
    let result: CallFunctionOnResult = resolved
        .session
        .send_command(
            "Runtime.callFunctionOn",
            Some(CallFunctionOnParams {
                function_declaration: function.to_string(),
                object_id: Some(resolved.object_id.clone()),
                arguments: Some(
                    arguments
                        .into_iter()
                        .map(|value| CallArgument {
                            value: Some(value),
                            object_id: None,
                        })
                        .collect(),
                ),
                return_by_value: Some(true),
                await_promise: Some(true),
                ..Default::default()
            }),
        )
        .await?;
    if let Some(exception) = result.exception_details {
        return Err(ActionError::NotInteractable(exception.text));
    }
    Ok(())
}
