//! XPath fallback dispatch.
//!
//! Used when CDP-primitive actions are disabled or a snapshot carries no
//! backend-node map: the same method set, driven entirely through script
//! evaluation against the element found by its captured XPath in the
//! right frame context. Events fired this way are untrusted; pages that
//! check `isTrusted` will see the difference.

use tracing::{debug, instrument};

use lookout_cdp::protocol::runtime::{EvaluateParams, EvaluateResult};

use crate::config::EngineConfig;
use crate::driver::Page;
use crate::encoded_id::EncodedId;
use crate::error::{ActionError, ResolveError};
use crate::frame_graph::FrameGraph;
use crate::settle;
use crate::snapshot::Snapshot;

use super::{Action, ActionOutcome, keys};

/// Execute one action through script evaluation.
#[instrument(level = "debug", skip_all, fields(encoded_id = %encoded_id, method = action.method_name()))]
pub(crate) async fn execute_via_xpath(
    page: &Page,
    graph: &FrameGraph,
    snapshot: &Snapshot,
    config: &EngineConfig,
    encoded_id: &str,
    action: &Action,
) -> Result<ActionOutcome, ActionError> {
    let id: EncodedId = encoded_id.parse().map_err(ActionError::Resolve)?;
    let xpath = snapshot
        .xpath_map
        .get(&id)
        .ok_or_else(|| ResolveError::NotFound(format!("no xpath for encoded id {id}")))?;

    let (session, context_id) = if id.frame_index == 0 {
        (graph.root_session().clone(), None)
    } else {
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
            ResolveError::NotFound(format!("no session for frame {frame_id}"))
        })?;
        let record = graph.record(&frame_id);
        let context_id = if record.as_ref().is_some_and(|r| r.is_oopif) {
            // OOPIF evaluation goes to its session's default context.
            None
        } else {
            match graph
                .wait_for_execution_context(&frame_id, config.execution_context_wait)
                .await
            {
                Some(context_id) => Some(context_id),
                None => {
                    return Err(ResolveError::FrameNotReady(format!(
                        "no execution context for frame {frame_id}"
                    ))
                    .into());
                }
            }
        };
        (session, context_id)
    };

    let body = action_body(action)?;
    let escaped = serde_json::to_string(xpath).map_err(lookout_cdp::CdpError::from)?;
    let expression = format!(
        r#"(() => {{
  const el = document.evaluate({escaped}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
  if (!el) return "stale";
  {body}
  return "ok";
}})()"#
    );

    let result: EvaluateResult = session
        .send_command(
            "Runtime.evaluate",
            Some(EvaluateParams {
                expression,
                context_id,
                silent: Some(true),
                return_by_value: Some(true),
                await_promise: Some(true),
                ..Default::default()
            }),
        )
        .await?;

    if let Some(exception) = result.exception_details {
        return Err(ActionError::NotInteractable(exception.text));
    }
    match result.result.value.as_ref().and_then(serde_json::Value::as_str) {
        Some("ok") => {}
        Some("stale") => {
            return Err(ResolveError::StaleElement(format!(
                "xpath no longer matches (encoded id {id})"
            ))
            .into());
        }
        Some(other) => {
            return Err(ActionError::NotInteractable(other.to_string()));
        }
        None => {
            return Err(ActionError::NotInteractable(
                "fallback evaluation returned nothing".to_string(),
            ));
        }
    }

    let settle_reason = if action.is_mutating() {
        let reason = settle::wait_for_settled_dom(page, config).await?;
        snapshot.mark_dirty();
        Some(reason)
    } else {
        None
    };

    debug!(settle = ?settle_reason, "fallback action complete");
    Ok(ActionOutcome::ok(
        format!("{} on {encoded_id} (xpath fallback)", action.method_name()),
        settle_reason,
    ))
}

/// The per-method script body, operating on `el`.
fn action_body(action: &Action) -> Result<String, ActionError> {
    let body = match action {
        Action::Click => "el.scrollIntoView({block: \"center\"}); el.click();".to_string(),
        Action::Hover => r#"el.dispatchEvent(new MouseEvent("mouseover", { bubbles: true }));
  el.dispatchEvent(new MouseEvent("mousemove", { bubbles: true }));"#
            .to_string(),
        Action::Fill { value } => {
            let value = serde_json::to_string(value).map_err(lookout_cdp::CdpError::from)?;
            format!(
                r#"el.focus();
  el.value = {value};
  el.dispatchEvent(new Event("input", {{ bubbles: true }}));
  el.dispatchEvent(new Event("change", {{ bubbles: true }}));"#
            )
        }
        Action::Type { text, press_enter } => {
            let text = serde_json::to_string(text).map_err(lookout_cdp::CdpError::from)?;
            let enter = if *press_enter {
                r#"
  el.dispatchEvent(new KeyboardEvent("keydown", { key: "Enter", bubbles: true }));
  el.dispatchEvent(new KeyboardEvent("keyup", { key: "Enter", bubbles: true }));"#
            } else {
                ""
            };
            format!(
                r#"el.focus();
  el.value = (el.value || "") + {text};
  el.dispatchEvent(new Event("input", {{ bubbles: true }}));
  el.dispatchEvent(new Event("change", {{ bubbles: true }}));{enter}"#
            )
        }
        Action::Press { key } => {
            let def = keys::lookup(key)
                .ok_or_else(|| ActionError::BadRequest(format!("unknown key {key:?}")))?;
            let key = serde_json::to_string(&def.key).map_err(lookout_cdp::CdpError::from)?;
            format!(
                r#"el.dispatchEvent(new KeyboardEvent("keydown", {{ key: {key}, bubbles: true }}));
  el.dispatchEvent(new KeyboardEvent("keyup", {{ key: {key}, bubbles: true }}));"#
            )
        }
        Action::SelectOptionFromDropdown { option } => {
            let option = serde_json::to_string(option).map_err(lookout_cdp::CdpError::from)?;
            format!(
                r#"const wanted = {option};
  let matched = null;
  for (const candidate of el.options) {{
    if (candidate.value === wanted) {{ matched = candidate; break; }}
  }}
  if (!matched) {{
    for (const candidate of el.options) {{
      if (candidate.text.trim() === wanted.trim()) {{ matched = candidate; break; }}
    }}
  }}
  if (!matched) return "no matching option";
  matched.selected = true;
  el.dispatchEvent(new Event("change", {{ bubbles: true }}));"#
            )
        }
        Action::Check => checked_body(true),
        Action::Uncheck => checked_body(false),
        Action::ScrollToElement => "el.scrollIntoView({block: \"center\"});".to_string(),
        Action::ScrollToPercentage { percent } => format!(
            r#"const target = el.scrollHeight > el.clientHeight ? el : (document.scrollingElement || document.documentElement);
  target.scrollTo({{ top: (target.scrollHeight - target.clientHeight) * ({percent} / 100), behavior: "smooth" }});"#
        ),
        Action::NextChunk => chunk_body(1),
        Action::PrevChunk => chunk_body(-1),
    };
    Ok(body)
}

fn checked_body(checked: bool) -> String {
    format!(
        r#"if (el.checked !== {checked}) {{
    el.checked = {checked};
    el.dispatchEvent(new Event("change", {{ bubbles: true }}));
    el.dispatchEvent(new Event("input", {{ bubbles: true }}));
  }}"#
    )
}

fn chunk_body(direction: i32) -> String {
    format!(
        r#"let target = el;
  while (target && target !== document.body && target !== document.documentElement) {{
    const style = getComputedStyle(target);
    if (target.scrollHeight > target.clientHeight + 1 &&
        (style.overflowY === "auto" || style.overflowY === "scroll" || style.overflowY === "overlay")) break;
    target = target.parentElement;
  }}
  if (!target || target === document.body || target === document.documentElement) {{
    target = document.scrollingElement || document.documentElement;
  }}
  const viewport = (target === document.scrollingElement || target === document.documentElement)
    ? window.innerHeight : target.clientHeight;
  target.scrollBy({{ top: {direction} * viewport, behavior: "smooth" }});"#
    )
}
