use super::*;

#[test]
fn test_resolve_xpaths_matches_frame_scoped_entries() {
    let mut xpath_map = HashMap::new();
    xpath_map.insert(EncodedId::new(0, 4), "/html/body/div[1]".to_string());
    xpath_map.insert(EncodedId::new(0, 5), "/html/body/div[2]".to_string());
    xpath_map.insert(EncodedId::new(1, 9), "/html/body/div[1]".to_string());

    let xpaths = vec!["/html/body/div[2]".to_string(), "/html/body/div[1]".to_string()];

    let frame0 = resolve_xpaths(&xpaths, 0, &xpath_map);
    assert_eq!(frame0, [4, 5].into());

    // The same xpath in another frame resolves to that frame's element.
    let frame1 = resolve_xpaths(&xpaths, 1, &xpath_map);
    assert_eq!(frame1, [9].into());
}

#[test]
fn test_resolve_xpaths_drops_unmatched() {
    let mut xpath_map = HashMap::new();
    xpath_map.insert(EncodedId::new(0, 4), "/html/body/main".to_string());
    let xpaths = vec!["/html/body/aside".to_string()];
    assert!(resolve_xpaths(&xpaths, 0, &xpath_map).is_empty());
}

#[test]
fn test_probe_script_shape() {
    // The probe must restore scrollTop after testing and return a JSON
    // string; these textual checks pin the contract without a browser.
    assert!(SCROLLABLE_PROBE.contains("el.scrollTop = before"));
    assert!(SCROLLABLE_PROBE.contains("JSON.stringify"));
    assert!(SCROLLABLE_PROBE.contains("b.scrollHeight - a.scrollHeight"));
}
