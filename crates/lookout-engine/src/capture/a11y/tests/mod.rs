use super::*;

fn ax(id: &str, role: &str, backend: Option<i64>, children: &[&str]) -> AXNode {
    AXNode {
        node_id: id.to_string(),
        ignored: false,
        role: Some(AXValue {
            value_type: "role".to_string(),
            value: Some(serde_json::json!(role)),
        }),
        name: None,
        description: None,
        value: None,
        properties: None,
        parent_id: None,
        child_ids: if children.is_empty() {
            None
        } else {
            Some(children.iter().map(ToString::to_string).collect())
        },
        backend_dom_node_id: backend,
        frame_id: None,
    }
}

#[test]
fn test_interactive_role_detection() {
    assert!(has_interactive_roles(&[ax("1", "button", Some(4), &[])]));
    assert!(has_interactive_roles(&[
        ax("1", "generic", Some(3), &[]),
        ax("2", "searchbox", Some(4), &[]),
    ]));
    assert!(!has_interactive_roles(&[
        ax("1", "generic", Some(3), &[]),
        ax("2", "StaticText", Some(4), &[]),
    ]));
}

#[test]
fn test_ignored_interactive_nodes_do_not_count() {
    let mut button = ax("1", "button", Some(4), &[]);
    button.ignored = true;
    assert!(!has_interactive_roles(&[button]));
}

#[test]
fn test_subtree_filter_drops_fetched_relatives() {
    // 1 (page doc) -> 2 (iframe doc, backend 50) -> 3; 4 is a sibling
    // outside the iframe that fetchRelatives dragged in.
    let nodes = vec![
        ax("1", "WebArea", Some(1), &["2", "4"]),
        ax("2", "WebArea", Some(50), &["3"]),
        ax("3", "button", Some(51), &[]),
        ax("4", "link", Some(9), &[]),
    ];
    let subtree = subtree_of(nodes, 50);
    let ids: Vec<&str> = subtree.iter().map(|n| n.node_id.as_str()).collect();
    assert_eq!(ids, ["2", "3"]);
}

#[test]
fn test_subtree_filter_without_anchor_keeps_all() {
    let nodes = vec![ax("1", "WebArea", Some(1), &["2"]), ax("2", "button", Some(2), &[])];
    assert_eq!(subtree_of(nodes, 99).len(), 2);
}

#[test]
fn test_fallback_synthesis_maps_tags_to_roles() {
    let mut tag_name_map = HashMap::new();
    let mut accessible_name_map = HashMap::new();
    tag_name_map.insert(EncodedId::new(1, 10), "input".to_string());
    tag_name_map.insert(EncodedId::new(1, 11), "button".to_string());
    tag_name_map.insert(EncodedId::new(1, 12), "a".to_string());
    tag_name_map.insert(EncodedId::new(1, 13), "select".to_string());
    tag_name_map.insert(EncodedId::new(1, 14), "div".to_string());
    tag_name_map.insert(EncodedId::new(2, 20), "input".to_string());
    accessible_name_map.insert(EncodedId::new(1, 10), "q".to_string());

    let nodes = synthesize_dom_fallback(1, &tag_name_map, &accessible_name_map);
    assert_eq!(nodes.len(), 4, "div and other frames excluded");

    let roles: Vec<&str> = nodes
        .iter()
        .map(|n| n.role.as_ref().unwrap().as_str().unwrap())
        .collect();
    assert_eq!(roles, ["textbox", "button", "link", "combobox"]);
    assert_eq!(
        nodes[0].name.as_ref().and_then(AXValue::as_str),
        Some("q")
    );
    assert_eq!(nodes[0].backend_dom_node_id, Some(10));
}

#[test]
fn test_with_fallback_keeps_interactive_trees() {
    let fetched = vec![ax("1", "button", Some(4), &[])];
    let tag_name_map = HashMap::new();
    let out = with_fallback(fetched.clone(), 0, &tag_name_map, &HashMap::new());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].node_id, "1");
}

#[test]
fn test_with_fallback_synthesizes_for_inert_trees() {
    let fetched = vec![ax("1", "generic", Some(3), &[])];
    let mut tag_name_map = HashMap::new();
    tag_name_map.insert(EncodedId::new(0, 7), "button".to_string());
    let out = with_fallback(fetched, 0, &tag_name_map, &HashMap::new());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].backend_dom_node_id, Some(7));
}

#[test]
fn test_with_fallback_keeps_fetched_when_nothing_to_synthesize() {
    let fetched = vec![ax("1", "StaticText", Some(3), &[])];
    let out = with_fallback(fetched, 0, &HashMap::new(), &HashMap::new());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].node_id, "1");
}
