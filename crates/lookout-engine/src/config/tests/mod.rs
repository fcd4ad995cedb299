use super::*;

#[test]
fn test_default_budgets_match_contract() {
    let config = EngineConfig::default();
    assert_eq!(config.capture_retries, 3);
    assert_eq!(config.snapshot_ttl, Duration::from_secs(1));
    assert_eq!(config.settle_timeout, Duration::from_millis(5000));
    assert_eq!(config.click_timeout, Duration::from_millis(3500));
    assert_eq!(config.execution_context_wait, Duration::from_millis(750));
    assert!(config.cdp_actions);
}

#[test]
fn test_ad_frame_deny_list() {
    let config = EngineConfig::default();
    assert!(config.is_denied_frame_url(
        "https://tpc.googlesyndication.com/safeframe/1-0-40/html/container.html"
    ));
    assert!(config.is_denied_frame_url("https://ad.doubleclick.net/ddm/adi/x"));
    assert!(!config.is_denied_frame_url("https://app.example/checkout"));
}

#[test]
fn test_observe_options_builder() {
    let options = ObserveOptions::default()
        .visual_mode(true)
        .use_cache(true)
        .streaming(true)
        .debug_dir("/tmp/lookout-debug");
    assert!(options.visual_mode);
    assert!(options.use_cache);
    assert!(options.streaming);
    assert!(options.debug_dir.is_some());
}
