use super::*;

#[test]
fn test_ax_node_deserialization() {
    let json = r#"{
        "nodeId": "7",
        "ignored": false,
        "role": {"type": "role", "value": "button"},
        "name": {"type": "computedString", "value": "Submit"},
        "childIds": ["8", "9"],
        "backendDOMNodeId": 42
    }"#;
    let node: AXNode = serde_json::from_str(json).unwrap();
    assert_eq!(node.node_id, "7");
    assert!(!node.ignored);
    assert_eq!(node.role.as_ref().and_then(AXValue::as_str), Some("button"));
    assert_eq!(node.name.as_ref().and_then(AXValue::as_str), Some("Submit"));
    assert_eq!(node.backend_dom_node_id, Some(42));
    assert_eq!(node.child_ids.as_ref().map(Vec::len), Some(2));
}

#[test]
fn test_ignored_node_without_role() {
    let json = r#"{"nodeId": "1", "ignored": true}"#;
    let node: AXNode = serde_json::from_str(json).unwrap();
    assert!(node.ignored);
    assert!(node.role.is_none());
}

#[test]
fn test_ax_value_non_string() {
    let json = r#"{"type": "integer", "value": 3}"#;
    let value: AXValue = serde_json::from_str(json).unwrap();
    assert!(value.as_str().is_none());
    assert_eq!(value.value, Some(serde_json::json!(3)));
}

#[test]
fn test_partial_tree_params_serialization() {
    let params = GetPartialAXTreeParams {
        backend_node_id: Some(17),
        fetch_relatives: Some(true),
        ..Default::default()
    };
    let json = serde_json::to_string(&params).unwrap();
    assert_eq!(json, r#"{"backendNodeId":17,"fetchRelatives":true}"#);
}
