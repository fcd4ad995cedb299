use std::time::Duration;

use super::*;

fn protocol_error(message: &str) -> CdpError {
    CdpError::Protocol {
        method: "DOM.resolveNode".to_string(),
        code: -32000,
        message: message.to_string(),
    }
}

#[test]
fn test_node_gone_classification() {
    assert!(protocol_error("No node with given id found").is_node_gone());
    assert!(protocol_error("Could not find node with given id").is_node_gone());
    assert!(!protocol_error("Invalid parameters").is_node_gone());
}

#[test]
fn test_node_gone_is_case_insensitive() {
    assert!(protocol_error("NO NODE WITH GIVEN ID").is_node_gone());
}

#[test]
fn test_context_lost_classification() {
    assert!(protocol_error("Execution context was destroyed.").is_context_lost());
    assert!(protocol_error("Cannot find context with specified id").is_context_lost());
    assert!(CdpError::TargetClosed.is_context_lost());
    assert!(CdpError::ConnectionLost.is_context_lost());
    assert!(CdpError::SessionDetached("abc".to_string()).is_context_lost());
    assert!(!protocol_error("Invalid parameters").is_context_lost());
}

#[test]
fn test_timeout_is_not_recoverable_class() {
    let err = CdpError::Timeout {
        method: "Page.enable".to_string(),
        timeout: Duration::from_secs(5),
    };
    assert!(!err.is_node_gone());
    assert!(!err.is_context_lost());
}

#[test]
fn test_protocol_error_carries_method_and_message() {
    let err = protocol_error("No node with given id");
    let text = err.to_string();
    assert!(text.contains("DOM.resolveNode"));
    assert!(text.contains("No node with given id"));
}

#[test]
fn test_tungstenite_conversion() {
    let err: CdpError = tokio_tungstenite::tungstenite::Error::ConnectionClosed.into();
    assert!(matches!(err, CdpError::ConnectionLost));
}
