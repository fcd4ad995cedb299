use std::time::Duration;

use super::*;

#[test]
fn test_browser_version_deserialization() {
    let json = r#"{
        "Browser": "Chrome/131.0.6778.85",
        "Protocol-Version": "1.3",
        "User-Agent": "Mozilla/5.0",
        "webSocketDebuggerUrl": "ws://localhost:9222/devtools/browser/abc"
    }"#;
    let version: BrowserVersion = serde_json::from_str(json).unwrap();
    assert_eq!(version.browser.as_deref(), Some("Chrome/131.0.6778.85"));
    assert_eq!(
        version.web_socket_debugger_url.as_deref(),
        Some("ws://localhost:9222/devtools/browser/abc")
    );
}

#[test]
fn test_browser_version_without_ws_url() {
    let version: BrowserVersion = serde_json::from_str("{}").unwrap();
    assert!(version.web_socket_debugger_url.is_none());
}

#[tokio::test]
async fn test_invalid_endpoint_url_is_rejected() {
    let err = discover_websocket_url("not a url", &CdpConnectionOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CdpError::InvalidEndpointUrl(_)));
}

#[test]
fn test_options_builder() {
    let options = CdpConnectionOptions::new().timeout(Duration::from_secs(3));
    assert_eq!(options.timeout, Some(Duration::from_secs(3)));
}
