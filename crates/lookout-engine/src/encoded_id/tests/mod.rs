use super::*;

#[test]
fn test_format() {
    assert_eq!(EncodedId::new(0, 42).to_string(), "0-42");
    assert_eq!(EncodedId::new(3, 1017).to_string(), "3-1017");
}

#[test]
fn test_parse() {
    let id: EncodedId = "2-17".parse().unwrap();
    assert_eq!(id.frame_index, 2);
    assert_eq!(id.backend_node_id, 17);
    assert!(!id.is_main_frame());
    assert!("0-1".parse::<EncodedId>().unwrap().is_main_frame());
}

#[test]
fn test_round_trip() {
    for raw in ["0-0", "0-42", "1-1", "12-345678", "999-1"] {
        let id: EncodedId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
    }
}

#[test]
fn test_rejects_malformed() {
    for raw in [
        "", "-", "1-", "-1", "a-1", "1-b", "1.5-2", "1-2-3", "1 - 2", " 1-2", "1-2 ", "+1-2",
        "1--2",
    ] {
        assert!(raw.parse::<EncodedId>().is_err(), "accepted {raw:?}");
    }
}

#[test]
fn test_rejects_leading_zeros() {
    assert!("01-2".parse::<EncodedId>().is_err());
    assert!("1-02".parse::<EncodedId>().is_err());
    // A lone zero is not a leading zero.
    assert!("0-2".parse::<EncodedId>().is_ok());
    assert!("2-0".parse::<EncodedId>().is_ok());
}

#[test]
fn test_parse_failure_is_bad_request() {
    let err = "nonsense".parse::<EncodedId>().unwrap_err();
    assert!(matches!(err, crate::error::ResolveError::BadRequest(_)));
}

#[test]
fn test_serde_as_string() {
    let id = EncodedId::new(1, 9);
    assert_eq!(serde_json::to_string(&id).unwrap(), r#""1-9""#);
    let back: EncodedId = serde_json::from_str(r#""1-9""#).unwrap();
    assert_eq!(back, id);
}

#[test]
fn test_ordering_groups_by_frame() {
    let mut ids = vec![
        EncodedId::new(1, 2),
        EncodedId::new(0, 50),
        EncodedId::new(0, 3),
        EncodedId::new(2, 1),
    ];
    ids.sort();
    assert_eq!(
        ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
        ["0-3", "0-50", "1-2", "2-1"]
    );
}
