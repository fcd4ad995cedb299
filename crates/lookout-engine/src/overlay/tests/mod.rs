use std::collections::BTreeMap;

use super::*;
use crate::capture::CaptureMetrics;
use crate::snapshot::{AccessibilityNode, IframeInfo};

fn node(backend: i64) -> AccessibilityNode {
    AccessibilityNode {
        role: "button".to_string(),
        name: Some("Go".to_string()),
        description: None,
        value: None,
        backend_dom_node_id: backend,
        children: None,
    }
}

fn output_with(
    element_ids: &[EncodedId],
    frames: Vec<IframeInfo>,
) -> CaptureOutput {
    let mut elements = BTreeMap::new();
    let mut xpath_map = HashMap::new();
    let mut backend_node_map = HashMap::new();
    for id in element_ids {
        elements.insert(*id, node(id.backend_node_id as i64));
        xpath_map.insert(*id, format!("/html/body/el{}", id.backend_node_id));
        backend_node_map.insert(*id, id.backend_node_id as i64);
    }
    CaptureOutput {
        dom_state: String::new(),
        elements,
        xpath_map,
        backend_node_map,
        frame_map: frames.into_iter().map(|f| (f.frame_index, f)).collect(),
        metrics: CaptureMetrics::default(),
    }
}

fn iframe(frame_index: u64, parent: Option<u64>, iframe_backend: i64) -> IframeInfo {
    IframeInfo {
        frame_index,
        parent_frame_index: parent,
        iframe_backend_node_id: iframe_backend,
        content_document_backend_node_id: Some(iframe_backend + 1),
        xpath: format!("/html/body/iframe{frame_index}"),
        src: None,
        name: None,
        sibling_position: 1,
        frame_id: Some(format!("F{frame_index}")),
        execution_context_id: Some(frame_index as i64),
        cdp_session_id: None,
        is_oopif: false,
        absolute_bounding_box: None,
        frame_path: None,
    }
}

#[test]
fn test_frame_batch_includes_elements_and_hosted_iframes() {
    let main_button = EncodedId::new(0, 4);
    let inner_input = EncodedId::new(1, 9);
    let output = output_with(&[main_button, inner_input], vec![iframe(1, Some(0), 30)]);

    let batch = frame_batch(&output, 0);
    assert_eq!(batch.len(), 2, "main element plus hosted iframe");
    assert_eq!(batch["/html/body/el4"], 4);
    assert_eq!(batch["/html/body/iframe1"], 30);

    let child_batch = frame_batch(&output, 1);
    assert_eq!(child_batch.len(), 1);
    assert_eq!(child_batch["/html/body/el9"], 9);
}

#[test]
fn test_translation_offsets_child_frames_into_viewport_coordinates() {
    let main_button = EncodedId::new(0, 4);
    let inner_input = EncodedId::new(1, 9);
    let mut output = output_with(&[main_button, inner_input], vec![iframe(1, Some(0), 30)]);

    let mut boxes_by_frame = HashMap::new();
    boxes_by_frame.insert(
        0,
        HashMap::from([
            (4, Rect::new(10.0, 10.0, 80.0, 20.0)),
            (30, Rect::new(100.0, 200.0, 400.0, 300.0)),
        ]),
    );
    boxes_by_frame.insert(1, HashMap::from([(9, Rect::new(5.0, 8.0, 60.0, 20.0))]));

    let (final_map, failures) = translate_to_viewport(&mut output, &boxes_by_frame);
    assert!(failures.is_empty());

    // Main-frame rectangles are already absolute.
    assert_eq!(final_map[&main_button], Rect::new(10.0, 10.0, 80.0, 20.0));
    // Child rectangles shift by the iframe element's origin.
    assert_eq!(final_map[&inner_input], Rect::new(105.0, 208.0, 60.0, 20.0));
    assert_eq!(
        output.frame_map[&1].absolute_bounding_box,
        Some(Rect::new(100.0, 200.0, 400.0, 300.0))
    );
}

#[test]
fn test_translation_chains_through_nested_frames() {
    let deep = EncodedId::new(2, 9);
    let mut output = output_with(
        &[deep],
        vec![iframe(1, Some(0), 30), iframe(2, Some(1), 40)],
    );

    let mut boxes_by_frame = HashMap::new();
    boxes_by_frame.insert(0, HashMap::from([(30, Rect::new(100.0, 100.0, 500.0, 500.0))]));
    boxes_by_frame.insert(1, HashMap::from([(40, Rect::new(50.0, 60.0, 300.0, 300.0))]));
    boxes_by_frame.insert(2, HashMap::from([(9, Rect::new(1.0, 2.0, 10.0, 10.0))]));

    let (final_map, failures) = translate_to_viewport(&mut output, &boxes_by_frame);
    assert!(failures.is_empty());
    assert_eq!(final_map[&deep], Rect::new(151.0, 162.0, 10.0, 10.0));
    assert_eq!(
        output.frame_map[&2].absolute_bounding_box,
        Some(Rect::new(150.0, 160.0, 300.0, 300.0))
    );
}

#[test]
fn test_elements_without_layout_are_reported() {
    let placed = EncodedId::new(0, 4);
    let hidden = EncodedId::new(0, 5);
    let mut output = output_with(&[placed, hidden], vec![]);

    let mut boxes_by_frame = HashMap::new();
    boxes_by_frame.insert(0, HashMap::from([(4, Rect::new(0.0, 0.0, 10.0, 10.0))]));

    let (final_map, failures) = translate_to_viewport(&mut output, &boxes_by_frame);
    assert_eq!(final_map.len(), 1);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].encoded_id, hidden);
    assert_eq!(failures[0].reason, "no layout");
}

fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    let mut out = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    canvas.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
    out
}

#[test]
fn test_overlay_draws_box_and_label() {
    let png = blank_png(200, 120);
    let boxes = HashMap::from([(EncodedId::new(0, 4), Rect::new(40.0, 30.0, 100.0, 50.0))]);
    let overlay = compose_overlay(&png, &boxes).unwrap();

    let rendered = image::load_from_memory(&overlay).unwrap().to_rgba8();
    // Border pixel took the first palette color.
    assert_eq!(rendered.get_pixel(40, 30), &PALETTE[0]);
    assert_eq!(rendered.get_pixel(139, 79), &PALETTE[0]);
    // Label background sits above the box.
    assert_eq!(rendered.get_pixel(41, 20), &PALETTE[0]);
    // Far corner untouched.
    assert_eq!(rendered.get_pixel(199, 119), &Rgba([255, 255, 255, 255]));
}

#[test]
fn test_overlay_drops_offscreen_boxes() {
    let png = blank_png(100, 100);
    let boxes = HashMap::from([
        (EncodedId::new(0, 4), Rect::new(-500.0, -500.0, 50.0, 50.0)),
        (EncodedId::new(0, 5), Rect::new(400.0, 400.0, 50.0, 50.0)),
    ]);
    let overlay = compose_overlay(&png, &boxes).unwrap();
    let rendered = image::load_from_memory(&overlay).unwrap().to_rgba8();
    for (_, _, pixel) in rendered.enumerate_pixels() {
        assert_eq!(pixel, &Rgba([255, 255, 255, 255]));
    }
}

#[test]
fn test_glyph_alphabet_covers_encoded_ids() {
    for c in "0123456789-".chars() {
        assert_ne!(glyph(c), [0; 5], "glyph for {c}");
    }
    assert_eq!(glyph('x'), [0; 5]);
}
