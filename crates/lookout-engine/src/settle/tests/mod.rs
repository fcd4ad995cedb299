use super::*;

fn network_event(method: &str, request_id: &str) -> CdpEvent {
    serde_json::from_value(serde_json::json!({
        "method": method,
        "params": {"requestId": request_id},
        "sessionId": "lifecycle",
    }))
    .unwrap()
}

#[test]
fn test_tracker_counts_in_flight_requests() {
    let mut tracker = SettleTracker::default();
    assert!(tracker.is_quiet());

    tracker.observe(&network_event("Network.requestWillBeSent", "R1"));
    tracker.observe(&network_event("Network.requestWillBeSent", "R2"));
    assert!(!tracker.is_quiet());
    assert_eq!(tracker.in_flight_count(), 2);

    tracker.observe(&network_event("Network.loadingFinished", "R1"));
    assert_eq!(tracker.in_flight_count(), 1);
    tracker.observe(&network_event("Network.loadingFailed", "R2"));
    assert!(tracker.is_quiet());
}

#[test]
fn test_tracker_ignores_unknown_request_completion() {
    let mut tracker = SettleTracker::default();
    tracker.observe(&network_event("Network.loadingFinished", "never-seen"));
    assert!(tracker.is_quiet());
}

#[test]
fn test_tracker_dedupes_request_ids() {
    let mut tracker = SettleTracker::default();
    tracker.observe(&network_event("Network.requestWillBeSent", "R1"));
    // Redirects re-announce the same request id.
    tracker.observe(&network_event("Network.requestWillBeSent", "R1"));
    assert_eq!(tracker.in_flight_count(), 1);
    tracker.observe(&network_event("Network.loadingFinished", "R1"));
    assert!(tracker.is_quiet());
}

#[test]
fn test_tracker_ignores_non_network_events() {
    let mut tracker = SettleTracker::default();
    let event: CdpEvent = serde_json::from_value(serde_json::json!({
        "method": "Page.frameNavigated",
        "params": {"frame": {"id": "F1", "url": "https://example.com"}},
    }))
    .unwrap();
    tracker.observe(&event);
    assert!(tracker.is_quiet());
}

#[test]
fn test_settle_reason_serialization() {
    assert_eq!(
        serde_json::to_string(&SettleReason::Quiet).unwrap(),
        r#""quiet""#
    );
    assert_eq!(
        serde_json::to_string(&SettleReason::Timeout).unwrap(),
        r#""timeout""#
    );
}
