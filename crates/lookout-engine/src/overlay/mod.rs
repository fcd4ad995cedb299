//! Bounding boxes and the visual overlay (visual mode only).
//!
//! Rectangles are collected per frame with one batched evaluation, then
//! translated into main-viewport coordinates by walking the iframe
//! ancestry. The overlay is the page screenshot with one labeled
//! rectangle per element, the label being the element's encoded id.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use image::{Rgba, RgbaImage};
use serde::Serialize;
use tracing::{debug, instrument, trace};

use lookout_cdp::CdpSession;
use lookout_cdp::protocol::dom::BackendNodeId;
use lookout_cdp::protocol::page::{CaptureScreenshotParams, CaptureScreenshotResult};
use lookout_cdp::protocol::runtime::{EvaluateParams, EvaluateResult, ExecutionContextId};
use lookout_cdp::SessionKind;

use crate::capture::CaptureOutput;
use crate::driver::Page;
use crate::encoded_id::EncodedId;
use crate::error::CaptureError;
use crate::frame_graph::FrameGraph;
use crate::snapshot::Rect;

/// One element the layout engine could not place.
#[derive(Debug, Clone, Serialize)]
pub struct BoxFailure {
    /// The element that failed.
    pub encoded_id: EncodedId,
    /// Why ("no layout", "xpath missing", ...).
    pub reason: String,
}

/// The batch collector, installed at most once per (session, execution
/// context) pair through its own `||=` guard.
///
/// Takes `{xpath: backendNodeId}` and returns
/// `{backendNodeId: {x, y, width, height, top, left, right, bottom}}`
/// for every xpath that resolves to an element with layout.
const COLLECT_BOXES_HELPER: &str = r#"window.__lookoutCollectBoxes = window.__lookoutCollectBoxes || ((map) => {
  const out = {};
  for (const [xpath, backendId] of Object.entries(map)) {
    const result = document.evaluate(xpath, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null);
    const el = result.singleNodeValue;
    if (!el || !el.getBoundingClientRect) continue;
    const rect = el.getBoundingClientRect();
    if (rect.width === 0 && rect.height === 0) continue;
    out[backendId] = {
      x: rect.x, y: rect.y, width: rect.width, height: rect.height,
      top: rect.top, left: rect.left, right: rect.right, bottom: rect.bottom,
    };
  }
  return out;
})"#;

#[derive(Debug, serde::Deserialize)]
struct RawRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Collect raw rectangles for one frame with a single batched call.
async fn collect_frame_boxes(
    session: &Arc<CdpSession>,
    context_id: Option<ExecutionContextId>,
    batch: &HashMap<String, BackendNodeId>,
) -> Result<HashMap<BackendNodeId, Rect>, CaptureError> {
    if batch.is_empty() {
        return Ok(HashMap::new());
    }

    let map_json = serde_json::to_string(batch).map_err(lookout_cdp::CdpError::from)?;
    let result: EvaluateResult = session
        .send_command(
            "Runtime.evaluate",
            Some(EvaluateParams {
                expression: format!("JSON.stringify(({COLLECT_BOXES_HELPER})({map_json}))"),
                silent: Some(true),
                context_id,
                return_by_value: Some(true),
                ..Default::default()
            }),
        )
        .await?;

    if let Some(exception) = result.exception_details {
        debug!(error = %exception.text, "collectBoxes batch threw");
        return Ok(HashMap::new());
    }

    let raw: HashMap<String, RawRect> = result
        .result
        .value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();

    Ok(raw
        .into_iter()
        .filter_map(|(backend_id, rect)| {
            backend_id
                .parse::<BackendNodeId>()
                .ok()
                .map(|id| (id, Rect::new(rect.x, rect.y, rect.width, rect.height)))
        })
        .collect())
}

/// Collect viewport-absolute rectangles for every kept element.
///
/// Also fills `absolute_bounding_box` on each frame's entry in
/// `frame_map` (the iframe element's own rectangle, translated), which
/// is what child offsets chain through.
#[instrument(level = "debug", skip_all)]
pub(crate) async fn collect_bounding_boxes(
    page: &Page,
    graph: &FrameGraph,
    output: &mut CaptureOutput,
) -> Result<(HashMap<EncodedId, Rect>, Vec<BoxFailure>), CaptureError> {
    let root_session = page.root_session();

    // One (session, context, batch) triple per frame: main plus every
    // synced iframe. Building the plan first lets the evaluations fan
    // out in parallel, one batch per frame context.
    let mut plan: Vec<(u64, Arc<CdpSession>, Option<ExecutionContextId>, HashMap<String, BackendNodeId>)> =
        Vec::new();
    plan.push((0, Arc::clone(root_session), None, frame_batch(output, 0)));
    for (&frame_index, info) in &output.frame_map {
        let batch = frame_batch(output, frame_index);
        if batch.is_empty() {
            continue;
        }
        if info.is_oopif {
            let Some(session) = info
                .frame_id
                .as_deref()
                .and_then(|frame_id| graph.session_for_frame(frame_id))
            else {
                continue;
            };
            plan.push((frame_index, session, None, batch));
        } else {
            let Some(context_id) = info.execution_context_id else {
                // The open question: no context, frame silently skipped.
                trace!(frame_index = frame_index, "no execution context, skipping boxes");
                continue;
            };
            plan.push((frame_index, Arc::clone(root_session), Some(context_id), batch));
        }
    }

    let collections = plan.iter().map(|(frame_index, session, context_id, batch)| async move {
        (
            *frame_index,
            collect_frame_boxes(session, *context_id, batch).await,
        )
    });

    let mut boxes_by_frame: HashMap<u64, HashMap<BackendNodeId, Rect>> = HashMap::new();
    for (frame_index, collected) in futures::future::join_all(collections).await {
        match collected {
            Ok(boxes) => {
                boxes_by_frame.insert(frame_index, boxes);
            }
            Err(e) => debug!(frame_index = frame_index, error = %e, "box collection failed"),
        }
    }

    Ok(translate_to_viewport(output, &boxes_by_frame))
}

/// The `{xpath: backendNodeId}` batch for one frame: its kept elements
/// plus the iframe elements it hosts (whose rectangles seed child
/// offsets).
fn frame_batch(output: &CaptureOutput, frame_index: u64) -> HashMap<String, BackendNodeId> {
    let mut batch: HashMap<String, BackendNodeId> = output
        .elements
        .keys()
        .filter(|id| id.frame_index == frame_index)
        .filter_map(|id| {
            output
                .xpath_map
                .get(id)
                .map(|xpath| (xpath.clone(), id.backend_node_id as i64))
        })
        .collect();
    for info in output.frame_map.values() {
        if info.parent_frame_index == Some(frame_index) {
            batch.insert(info.xpath.clone(), info.iframe_backend_node_id);
        }
    }
    batch
}

/// Translate per-frame rectangles into main-viewport coordinates by
/// walking the `parent_frame_index` chain, and build the final filtered
/// map plus the failure report.
pub(crate) fn translate_to_viewport(
    output: &mut CaptureOutput,
    boxes_by_frame: &HashMap<u64, HashMap<BackendNodeId, Rect>>,
) -> (HashMap<EncodedId, Rect>, Vec<BoxFailure>) {
    // Absolute offset per frame: the owning iframe's absolute origin.
    let mut offsets: HashMap<u64, (f64, f64)> = HashMap::new();
    offsets.insert(0, (0.0, 0.0));

    fn offset_for(
        frame_index: u64,
        frame_map: &std::collections::BTreeMap<u64, crate::snapshot::IframeInfo>,
        boxes_by_frame: &HashMap<u64, HashMap<BackendNodeId, Rect>>,
        offsets: &mut HashMap<u64, (f64, f64)>,
        depth: usize,
    ) -> Option<(f64, f64)> {
        if let Some(&offset) = offsets.get(&frame_index) {
            return Some(offset);
        }
        if depth > frame_map.len() {
            return None;
        }
        let info = frame_map.get(&frame_index)?;
        let parent = info.parent_frame_index.unwrap_or(0);
        let (parent_x, parent_y) =
            offset_for(parent, frame_map, boxes_by_frame, offsets, depth + 1)?;
        let iframe_rect = boxes_by_frame
            .get(&parent)?
            .get(&info.iframe_backend_node_id)?;
        let offset = (parent_x + iframe_rect.x, parent_y + iframe_rect.y);
        offsets.insert(frame_index, offset);
        Some(offset)
    }

    // Fill each frame's absolute bounding box first.
    let frame_indices: Vec<u64> = output.frame_map.keys().copied().collect();
    for frame_index in frame_indices {
        let Some(info) = output.frame_map.get(&frame_index) else {
            continue;
        };
        let parent = info.parent_frame_index.unwrap_or(0);
        let iframe_backend = info.iframe_backend_node_id;
        let parent_offset = offset_for(
            parent,
            &output.frame_map,
            boxes_by_frame,
            &mut offsets,
            0,
        );
        if let (Some((px, py)), Some(rect)) = (
            parent_offset,
            boxes_by_frame.get(&parent).and_then(|m| m.get(&iframe_backend)),
        ) {
            let absolute = rect.translated(px, py);
            offsets.insert(frame_index, (absolute.x, absolute.y));
            if let Some(info) = output.frame_map.get_mut(&frame_index) {
                info.absolute_bounding_box = Some(absolute);
            }
        }
    }

    let mut final_map = HashMap::new();
    let mut failures = Vec::new();
    for id in output.elements.keys() {
        let raw = boxes_by_frame
            .get(&id.frame_index)
            .and_then(|m| m.get(&(id.backend_node_id as i64)));
        let Some(raw) = raw else {
            failures.push(BoxFailure {
                encoded_id: *id,
                reason: "no layout".to_string(),
            });
            continue;
        };
        let Some(&(dx, dy)) = offsets.get(&id.frame_index) else {
            failures.push(BoxFailure {
                encoded_id: *id,
                reason: "no ancestor offset".to_string(),
            });
            continue;
        };
        final_map.insert(*id, raw.translated(dx, dy));
    }
    (final_map, failures)
}

/// Capture a screenshot on the screenshot-pooled session.
pub(crate) async fn capture_screenshot(page: &Page) -> Result<Vec<u8>, CaptureError> {
    use base64::Engine as _;
    let session = page.session_pool().pooled(SessionKind::Screenshot).await?;
    let result: CaptureScreenshotResult = session
        .send_command(
            "Page.captureScreenshot",
            Some(CaptureScreenshotParams {
                format: Some("png".to_string()),
                ..Default::default()
            }),
        )
        .await?;
    base64::engine::general_purpose::STANDARD
        .decode(result.data)
        .map_err(|e| CaptureError::Cdp(lookout_cdp::CdpError::ConnectionFailed(e.to_string())))
}

const PALETTE: [Rgba<u8>; 6] = [
    Rgba([230, 60, 60, 255]),
    Rgba([60, 130, 230, 255]),
    Rgba([40, 170, 90, 255]),
    Rgba([220, 140, 30, 255]),
    Rgba([150, 70, 220, 255]),
    Rgba([30, 170, 180, 255]),
];

/// Compose the overlay: one colored rectangle and encoded-id label per
/// element, boxes fully outside the viewport dropped.
pub fn compose_overlay(
    screenshot_png: &[u8],
    boxes: &HashMap<EncodedId, Rect>,
) -> Result<Bytes, image::ImageError> {
    let mut canvas = image::load_from_memory(screenshot_png)?.to_rgba8();
    let (width, height) = canvas.dimensions();

    let mut ordered: Vec<(&EncodedId, &Rect)> = boxes.iter().collect();
    ordered.sort_by_key(|(id, _)| **id);

    for (index, (encoded_id, rect)) in ordered.into_iter().enumerate() {
        if !rect.intersects_viewport(f64::from(width), f64::from(height)) {
            continue;
        }
        let color = PALETTE[index % PALETTE.len()];
        draw_rect_outline(&mut canvas, rect, color);
        draw_label(&mut canvas, rect, &encoded_id.to_string(), color);
    }

    let mut encoded = Vec::new();
    {
        let mut cursor = std::io::Cursor::new(&mut encoded);
        canvas.write_to(&mut cursor, image::ImageFormat::Png)?;
    }
    Ok(Bytes::from(encoded))
}

fn draw_rect_outline(canvas: &mut RgbaImage, rect: &Rect, color: Rgba<u8>) {
    let (width, height) = canvas.dimensions();
    let x0 = rect.x.max(0.0) as u32;
    let y0 = rect.y.max(0.0) as u32;
    let x1 = (rect.right.min(f64::from(width)) as u32).saturating_sub(1);
    let y1 = (rect.bottom.min(f64::from(height)) as u32).saturating_sub(1);
    if x1 <= x0 || y1 <= y0 {
        return;
    }
    for thickness in 0..2u32 {
        for x in x0..=x1 {
            put_pixel(canvas, x, y0 + thickness, color);
            put_pixel(canvas, x, y1.saturating_sub(thickness), color);
        }
        for y in y0..=y1 {
            put_pixel(canvas, x0 + thickness, y, color);
            put_pixel(canvas, x1.saturating_sub(thickness), y, color);
        }
    }
}

/// 3x5 bitmap glyphs for the label alphabet: digits and the dash.
fn glyph(c: char) -> [u8; 5] {
    // Each byte is one row, low three bits are pixels.
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        _ => [0; 5],
    }
}

fn draw_label(canvas: &mut RgbaImage, rect: &Rect, text: &str, color: Rgba<u8>) {
    const SCALE: u32 = 2;
    let glyph_width = 4 * SCALE; // 3 pixels + 1 spacing
    let label_width = glyph_width * text.len() as u32 + 2 * SCALE;
    let label_height = 7 * SCALE;

    let x0 = rect.x.max(0.0) as u32;
    let y0 = (rect.y.max(0.0) as u32).saturating_sub(label_height);

    // Filled background in the box color, white glyphs on top.
    for y in y0..y0 + label_height {
        for x in x0..x0 + label_width {
            put_pixel(canvas, x, y, color);
        }
    }
    let white = Rgba([255, 255, 255, 255]);
    let mut pen_x = x0 + SCALE;
    let pen_y = y0 + SCALE;
    for c in text.chars() {
        let rows = glyph(c);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..3u32 {
                if bits & (0b100 >> col) != 0 {
                    for sy in 0..SCALE {
                        for sx in 0..SCALE {
                            put_pixel(
                                canvas,
                                pen_x + col * SCALE + sx,
                                pen_y + row as u32 * SCALE + sy,
                                white,
                            );
                        }
                    }
                }
            }
        }
        pen_x += glyph_width;
    }
}

fn put_pixel(canvas: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    if x < canvas.width() && y < canvas.height() {
        canvas.put_pixel(x, y, color);
    }
}

#[cfg(test)]
mod tests;
