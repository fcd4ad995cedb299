use super::*;

fn clean(frame: u64, backend: u64, role: &str, children: Vec<CleanNode>) -> CleanNode {
    CleanNode {
        encoded_id: EncodedId::new(frame, backend),
        role: role.to_string(),
        name: None,
        description: None,
        value: None,
        backend_node_id: backend as i64,
        children,
    }
}

fn iframe_info(frame_index: u64, parent: Option<u64>) -> IframeInfo {
    IframeInfo {
        frame_index,
        parent_frame_index: parent,
        iframe_backend_node_id: 100 + frame_index as i64,
        content_document_backend_node_id: None,
        xpath: "//iframe".to_string(),
        src: None,
        name: None,
        sibling_position: 1,
        frame_id: None,
        execution_context_id: None,
        cdp_session_id: None,
        is_oopif: false,
        absolute_bounding_box: None,
        frame_path: None,
    }
}

#[test]
fn test_prune_unmapped_splices_children_up() {
    let mut backend_node_map = HashMap::new();
    backend_node_map.insert(EncodedId::new(0, 1), 1);
    backend_node_map.insert(EncodedId::new(0, 3), 3);
    backend_node_map.insert(EncodedId::new(0, 4), 4);

    // Node 2 is unmapped; its children 3 and 4 take its place.
    let mut nodes = vec![clean(
        0,
        1,
        "main",
        vec![clean(
            0,
            2,
            "generic",
            vec![clean(0, 3, "link", vec![]), clean(0, 4, "link", vec![])],
        )],
    )];
    prune_unmapped(&mut nodes, &backend_node_map);

    assert_eq!(nodes.len(), 1);
    let main = &nodes[0];
    assert_eq!(main.children.len(), 2);
    assert_eq!(main.children[0].encoded_id, EncodedId::new(0, 3));
    assert_eq!(main.children[1].encoded_id, EncodedId::new(0, 4));
}

#[test]
fn test_prune_unmapped_removes_unmapped_roots() {
    let mut backend_node_map = HashMap::new();
    backend_node_map.insert(EncodedId::new(0, 2), 2);
    let mut nodes = vec![clean(0, 9, "generic", vec![clean(0, 2, "button", vec![])])];
    prune_unmapped(&mut nodes, &backend_node_map);
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].encoded_id, EncodedId::new(0, 2));
}

#[test]
fn test_annotate_frame_paths() {
    let mut frame_map = BTreeMap::new();
    frame_map.insert(1, iframe_info(1, Some(0)));
    frame_map.insert(2, iframe_info(2, Some(1)));
    annotate_frame_paths(&mut frame_map);

    assert_eq!(frame_map[&1].frame_path.as_deref(), Some("Main → Frame 1"));
    assert_eq!(
        frame_map[&2].frame_path.as_deref(),
        Some("Main → Frame 1 → Frame 2")
    );
}

mod pipeline {
    //! The pure slice of the capture pipeline, driven end to end on
    //! fixtures: DOM walk → AX merge → tree build → format, with the
    //! snapshot map invariants checked on the result.

    use lookout_cdp::protocol::accessibility::{AXNode, AXValue};
    use lookout_cdp::protocol::dom::Node;

    use super::super::{a11y, dom_walk, format, tree};
    use super::*;

    fn element(tag: &str, backend: i64, attrs: &[(&str, &str)], children: Vec<Node>) -> Node {
        Node {
            node_id: backend,
            backend_node_id: backend,
            node_type: 1,
            node_name: tag.to_ascii_uppercase(),
            local_name: tag.to_string(),
            node_value: String::new(),
            children: if children.is_empty() {
                None
            } else {
                Some(children)
            },
            attributes: Some(
                attrs
                    .iter()
                    .flat_map(|(k, v)| [(*k).to_string(), (*v).to_string()])
                    .collect(),
            ),
            content_document: None,
            shadow_roots: None,
            frame_id: None,
        }
    }

    fn document_node(backend: i64, children: Vec<Node>) -> Node {
        Node {
            node_id: backend,
            backend_node_id: backend,
            node_type: 9,
            node_name: "#document".to_string(),
            local_name: String::new(),
            node_value: String::new(),
            children: Some(children),
            attributes: None,
            content_document: None,
            shadow_roots: None,
            frame_id: None,
        }
    }

    fn ax(id: &str, parent: Option<&str>, role: &str, name: Option<&str>, backend: i64, children: &[&str]) -> AXNode {
        AXNode {
            node_id: id.to_string(),
            ignored: false,
            role: Some(AXValue {
                value_type: "role".to_string(),
                value: Some(serde_json::json!(role)),
            }),
            name: name.map(|n| AXValue {
                value_type: "computedString".to_string(),
                value: Some(serde_json::json!(n)),
            }),
            description: None,
            value: None,
            properties: None,
            parent_id: parent.map(ToString::to_string),
            child_ids: if children.is_empty() {
                None
            } else {
                Some(children.iter().map(ToString::to_string).collect())
            },
            backend_dom_node_id: Some(backend),
            frame_id: None,
        }
    }

    /// A page with one main-frame button plus a same-origin iframe with
    /// a text input, through the whole pure pipeline.
    #[test]
    fn test_walk_merge_format_round_trip() {
        let inner_doc = document_node(
            10,
            vec![element(
                "html",
                11,
                &[],
                vec![element(
                    "body",
                    12,
                    &[],
                    vec![element("input", 13, &[("type", "text"), ("name", "q")], vec![])],
                )],
            )],
        );
        let mut iframe = element("iframe", 5, &[("src", "/f.html")], vec![]);
        iframe.content_document = Some(Box::new(inner_doc));
        iframe.frame_id = Some("F1".to_string());
        let root = document_node(
            1,
            vec![element(
                "html",
                2,
                &[],
                vec![element(
                    "body",
                    3,
                    &[],
                    vec![element("button", 4, &[("id", "submit")], vec![]), iframe],
                )],
            )],
        );

        let mut maps = dom_walk::DomMaps::default();
        let mut next = 1;
        dom_walk::walk_document(&root, 0, &mut next, &mut maps);

        let button = EncodedId::new(0, 4);
        assert_eq!(maps.xpath_map[&button], "//button[@id=\"submit\"]");

        // Frame 0's AX tree arrives; the iframe's has no interactive
        // roles and synthesizes from the walk's tags.
        let mut ax_trees = BTreeMap::new();
        ax_trees.insert(
            0,
            vec![
                ax("1", None, "WebArea", None, 1, &["2"]),
                ax("2", Some("1"), "button", Some("Submit"), 4, &[]),
            ],
        );
        ax_trees.insert(
            1,
            a11y::with_fallback(
                vec![ax("9", None, "generic", None, 11, &[])],
                1,
                &maps.tag_name_map,
                &maps.accessible_name_map,
            ),
        );

        let mut frame_map = BTreeMap::new();
        let mut info = maps.iframes[0].clone();
        info.frame_id = Some("F1".to_string());
        frame_map.insert(1, info);

        let scrollable = HashSet::new();
        let mut trees = BTreeMap::new();
        let mut elements = BTreeMap::new();
        for (frame_index, nodes) in &ax_trees {
            let build = tree::TreeBuild {
                frame_index: *frame_index,
                scrollable: &scrollable,
                tag_name_map: &maps.tag_name_map,
            };
            let mut roots = build.build(nodes);
            prune_unmapped(&mut roots, &maps.backend_node_map);
            tree::collect_elements(&roots, &mut elements);
            trees.insert(*frame_index, roots);
        }

        let formatted = format::format_snapshot(&trees, &frame_map);
        assert!(formatted.contains("[0-4] button: Submit"));
        assert!(formatted.contains("=== Frame 1 (Main → Frame 1) ==="));
        assert!(formatted.contains("[1-13] textbox"));

        // The listing parses back into exactly the element set.
        let parsed = format::parse_encoded_ids(&formatted);
        let expected: std::collections::BTreeSet<EncodedId> =
            elements.keys().copied().collect();
        assert_eq!(parsed, expected);

        // Map-key closure: every element is addressable.
        for id in elements.keys() {
            assert!(maps.backend_node_map.contains_key(id), "{id} in backend map");
            assert!(maps.xpath_map.contains_key(id), "{id} in xpath map");
            assert!(
                id.frame_index == 0 || frame_map.contains_key(&id.frame_index),
                "{id} frame known"
            );
        }
    }
}

#[test]
fn test_metrics_serialize() {
    let mut metrics = CaptureMetrics::default();
    metrics.pass_timings_ms.insert("dom_walk".to_string(), 12);
    metrics.frames_captured = 2;
    metrics.element_count = 40;
    metrics.attempts = 1;
    let json = serde_json::to_value(&metrics).unwrap();
    assert_eq!(json["pass_timings_ms"]["dom_walk"], 12);
    assert_eq!(json["frames_captured"], 2);
}
