use super::*;

#[test]
fn test_action_local_classification() {
    let timeout = ActionError::Timeout {
        method: "click".to_string(),
        budget: Duration::from_millis(3500),
    };
    assert!(timeout.is_action_local());
    assert!(ActionError::NotInteractable("display:none".to_string()).is_action_local());
    assert!(
        ActionError::Resolve(ResolveError::StaleElement("2-7".to_string())).is_action_local()
    );
    assert!(
        ActionError::Resolve(ResolveError::FrameNotReady("F3".to_string())).is_action_local()
    );
}

#[test]
fn test_structural_failures_are_not_action_local() {
    assert!(!ActionError::BadRequest("bogus method".to_string()).is_action_local());
    assert!(
        !ActionError::Resolve(ResolveError::BadRequest("1-2-3".to_string())).is_action_local()
    );
    assert!(!ActionError::Resolve(ResolveError::NotFound("9-9".to_string())).is_action_local());
    assert!(!ActionError::Cdp(CdpError::TargetClosed).is_action_local());
}

#[test]
fn test_error_messages_carry_context() {
    let err = ResolveError::NotFound("frame index 4 not in graph (encoded id 4-12)".to_string());
    assert!(err.to_string().contains("4-12"));

    let err = ActionError::Timeout {
        method: "click".to_string(),
        budget: Duration::from_millis(3500),
    };
    assert!(err.to_string().contains("click"));
}

#[test]
fn test_cdp_errors_nest_into_engine_error() {
    let err: EngineError = CdpError::TargetClosed.into();
    assert!(matches!(err, EngineError::Cdp(_)));

    let err: EngineError = CaptureError::RetriesExhausted {
        attempts: 3,
        source: CdpError::TargetClosed,
    }
    .into();
    assert!(err.to_string().contains("3 attempts"));
}
