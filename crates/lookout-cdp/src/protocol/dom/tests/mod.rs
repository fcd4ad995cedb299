use super::*;

fn element_node(attributes: Vec<&str>) -> Node {
    Node {
        node_id: 1,
        backend_node_id: 10,
        node_type: 1,
        node_name: "INPUT".to_string(),
        local_name: "input".to_string(),
        node_value: String::new(),
        children: None,
        attributes: Some(attributes.into_iter().map(String::from).collect()),
        content_document: None,
        shadow_roots: None,
        frame_id: None,
    }
}

#[test]
fn test_attribute_lookup_from_flat_array() {
    let node = element_node(vec!["type", "text", "aria-label", "Search"]);
    assert_eq!(node.attribute("type"), Some("text"));
    assert_eq!(node.attribute("aria-label"), Some("Search"));
    assert_eq!(node.attribute("placeholder"), None);
}

#[test]
fn test_attribute_lookup_is_case_insensitive() {
    let node = element_node(vec!["ID", "submit"]);
    assert_eq!(node.attribute("id"), Some("submit"));
}

#[test]
fn test_attribute_lookup_without_attributes() {
    let mut node = element_node(vec![]);
    node.attributes = None;
    assert_eq!(node.attribute("id"), None);
}

#[test]
fn test_get_document_params_serialization() {
    let params = GetDocumentParams {
        depth: Some(-1),
        pierce: Some(true),
    };
    let json = serde_json::to_string(&params).unwrap();
    assert_eq!(json, r#"{"depth":-1,"pierce":true}"#);
}

#[test]
fn test_node_deserialization_with_content_document() {
    let json = r##"{
        "nodeId": 5,
        "backendNodeId": 42,
        "nodeType": 1,
        "nodeName": "IFRAME",
        "localName": "iframe",
        "nodeValue": "",
        "frameId": "F1",
        "contentDocument": {
            "nodeId": 6,
            "backendNodeId": 43,
            "nodeType": 9,
            "nodeName": "#document",
            "localName": "",
            "nodeValue": ""
        }
    }"##;
    let node: Node = serde_json::from_str(json).unwrap();
    assert!(node.is_element());
    assert_eq!(node.frame_id.as_deref(), Some("F1"));
    let doc = node.content_document.unwrap();
    assert_eq!(doc.backend_node_id, 43);
    assert!(!doc.is_element());
}

#[test]
fn test_box_model_deserialization() {
    let json = r#"{
        "content": [0,0,10,0,10,10,0,10],
        "padding": [0,0,10,0,10,10,0,10],
        "border": [0,0,10,0,10,10,0,10],
        "margin": [0,0,10,0,10,10,0,10],
        "width": 10,
        "height": 10
    }"#;
    let model: BoxModel = serde_json::from_str(json).unwrap();
    assert_eq!(model.border.len(), 8);
    assert!((model.width - 10.0).abs() < f64::EPSILON);
}
