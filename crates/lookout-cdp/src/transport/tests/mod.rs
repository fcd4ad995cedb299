use super::*;

#[test]
fn test_request_serialization_minimal() {
    let req = CdpRequest::new(1, "Page.enable", None, None);
    let json = serde_json::to_string(&req).unwrap();
    assert_eq!(json, r#"{"id":1,"method":"Page.enable"}"#);
}

#[test]
fn test_request_serialization_with_params_and_session() {
    let req = CdpRequest::new(
        7,
        "DOM.getDocument",
        Some(serde_json::json!({"depth": -1, "pierce": true})),
        Some("sess-1"),
    );
    let json = serde_json::to_string(&req).unwrap();
    assert!(json.contains(r#""method":"DOM.getDocument""#));
    assert!(json.contains(r#""pierce":true"#));
    assert!(json.contains(r#""sessionId":"sess-1""#));
}

#[test]
fn test_response_deserialization_success() {
    let json = r#"{"id":3,"result":{"root":{"nodeId":1}},"sessionId":"s"}"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    assert_eq!(resp.id, 3);
    assert!(resp.result.is_some());
    assert!(resp.error.is_none());
    assert_eq!(resp.session_id.as_deref(), Some("s"));
}

#[test]
fn test_response_deserialization_error() {
    let json = r#"{"id":4,"error":{"code":-32000,"message":"No node with given id found"}}"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    let err = resp.error.unwrap();
    assert_eq!(err.code, -32000);
    assert_eq!(err.message, "No node with given id found");
}

#[test]
fn test_untagged_message_dispatch() {
    let resp: CdpMessage = serde_json::from_str(r#"{"id":1,"result":{}}"#).unwrap();
    assert!(matches!(resp, CdpMessage::Response(_)));

    let event: CdpMessage =
        serde_json::from_str(r#"{"method":"Page.frameAttached","params":{"frameId":"F1"}}"#)
            .unwrap();
    assert!(matches!(event, CdpMessage::Event(_)));
}

#[test]
fn test_event_session_filter() {
    let event: CdpEvent = serde_json::from_str(
        r#"{"method":"Network.loadingFinished","params":{"requestId":"R1"},"sessionId":"lifecycle"}"#,
    )
    .unwrap();
    assert!(event.is_from_session("lifecycle"));
    assert!(!event.is_from_session("dom"));
}

#[test]
fn test_browser_level_event_matches_no_session() {
    let event: CdpEvent =
        serde_json::from_str(r#"{"method":"Target.targetCreated","params":{}}"#).unwrap();
    assert!(!event.is_from_session("any"));
}

#[test]
fn test_event_parse_params() {
    #[derive(serde::Deserialize)]
    struct FrameAttached {
        #[serde(rename = "frameId")]
        frame_id: String,
    }

    let event: CdpEvent =
        serde_json::from_str(r#"{"method":"Page.frameAttached","params":{"frameId":"F9"}}"#)
            .unwrap();
    let parsed: FrameAttached = event.parse_params().unwrap();
    assert_eq!(parsed.frame_id, "F9");

    let empty: CdpEvent = serde_json::from_str(r#"{"method":"Page.loadEventFired"}"#).unwrap();
    assert!(empty.parse_params::<FrameAttached>().is_none());
}
