use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use super::*;

fn iframe_info(frame_index: u64) -> IframeInfo {
    IframeInfo {
        frame_index,
        parent_frame_index: Some(0),
        iframe_backend_node_id: 100 + frame_index as i64,
        content_document_backend_node_id: None,
        xpath: "//iframe".to_string(),
        src: None,
        name: None,
        sibling_position: 1,
        frame_id: Some(format!("F{frame_index}")),
        execution_context_id: None,
        cdp_session_id: None,
        is_oopif: false,
        absolute_bounding_box: None,
        frame_path: None,
    }
}

fn snapshot_with(ids: &[(EncodedId, bool, bool)], frames: &[u64]) -> Snapshot {
    // (id, in_backend_map, in_xpath_map)
    let mut elements = BTreeMap::new();
    let mut backend_node_map = HashMap::new();
    let mut xpath_map = HashMap::new();
    for &(id, in_backend, in_xpath) in ids {
        elements.insert(
            id,
            AccessibilityNode {
                role: "button".to_string(),
                name: Some("Submit".to_string()),
                description: None,
                value: None,
                backend_dom_node_id: id.backend_node_id as i64,
                children: None,
            },
        );
        if in_backend {
            backend_node_map.insert(id, id.backend_node_id as i64);
        }
        if in_xpath {
            xpath_map.insert(id, "//button".to_string());
        }
    }
    Snapshot {
        dom_state: String::new(),
        elements,
        xpath_map,
        backend_node_map,
        frame_map: frames.iter().map(|&i| (i, iframe_info(i))).collect(),
        bounding_box_map: None,
        visual_overlay: None,
        generation: 7,
        captured_at: Instant::now(),
        dirty: AtomicBool::new(false),
        resolutions: Mutex::new(HashMap::new()),
        backend_overrides: Mutex::new(HashMap::new()),
    }
}

#[test]
fn test_rect_derived_edges_and_center() {
    let rect = Rect::new(10.0, 20.0, 100.0, 50.0);
    assert!((rect.right - 110.0).abs() < f64::EPSILON);
    assert!((rect.bottom - 70.0).abs() < f64::EPSILON);
    assert_eq!(rect.center(), (60.0, 45.0));
}

#[test]
fn test_rect_translation() {
    let rect = Rect::new(5.0, 5.0, 10.0, 10.0).translated(100.0, 200.0);
    assert!((rect.x - 105.0).abs() < f64::EPSILON);
    assert!((rect.top - 205.0).abs() < f64::EPSILON);
    assert!((rect.right - 115.0).abs() < f64::EPSILON);
}

#[test]
fn test_rect_viewport_intersection() {
    assert!(Rect::new(10.0, 10.0, 5.0, 5.0).intersects_viewport(1280.0, 720.0));
    assert!(!Rect::new(-20.0, 10.0, 5.0, 5.0).intersects_viewport(1280.0, 720.0));
    assert!(!Rect::new(1290.0, 10.0, 5.0, 5.0).intersects_viewport(1280.0, 720.0));
    // Partially visible counts.
    assert!(Rect::new(-2.0, -2.0, 5.0, 5.0).intersects_viewport(1280.0, 720.0));
}

#[test]
fn test_validate_passes_consistent_snapshot() {
    let id0 = EncodedId::new(0, 5);
    let id1 = EncodedId::new(1, 9);
    let snapshot = snapshot_with(&[(id0, true, true), (id1, true, true)], &[1]);
    assert!(snapshot.validate().is_empty());
}

#[test]
fn test_validate_reports_missing_map_entries() {
    let id = EncodedId::new(0, 5);
    let snapshot = snapshot_with(&[(id, false, true)], &[]);
    let violations = snapshot.validate();
    assert_eq!(violations.len(), 1);
    assert!(violations[0].contains("backend_node_map"));
}

#[test]
fn test_validate_reports_missing_frame() {
    let id = EncodedId::new(2, 5);
    let snapshot = snapshot_with(&[(id, true, true)], &[]);
    let violations = snapshot.validate();
    assert!(violations.iter().any(|v| v.contains("frame index 2")));
}

#[test]
fn test_freshness_requires_clean_generation_and_age() {
    let snapshot = snapshot_with(&[], &[]);
    let ttl = Duration::from_secs(1);
    assert!(snapshot.is_fresh(7, ttl));
    assert!(!snapshot.is_fresh(8, ttl), "generation moved");

    snapshot.mark_dirty();
    assert!(!snapshot.is_fresh(7, ttl), "dirty snapshots never fresh");
}

#[test]
fn test_dirty_flag() {
    let snapshot = snapshot_with(&[], &[]);
    assert!(!snapshot.is_dirty());
    snapshot.mark_dirty();
    assert!(snapshot.is_dirty());
}

#[test]
fn test_backend_override_shadows_captured_value() {
    let id = EncodedId::new(0, 5);
    let snapshot = snapshot_with(&[(id, true, true)], &[]);
    assert_eq!(snapshot.effective_backend_node_id(id), Some(5));

    snapshot.override_backend_node_id(id, 91);
    assert_eq!(snapshot.effective_backend_node_id(id), Some(91));
    // The captured map itself is untouched.
    assert_eq!(snapshot.backend_node_map[&id], 5);
}
