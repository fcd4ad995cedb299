use super::*;

fn test_session(id: &str) -> Arc<CdpSession> {
    Arc::new(CdpSession::new(
        Arc::new(CdpConnection::disconnected()),
        id.to_string(),
    ))
}

#[test]
fn test_session_kind_all_is_exhaustive() {
    assert_eq!(SessionKind::ALL.len(), 3);
    assert!(SessionKind::ALL.contains(&SessionKind::Dom));
    assert!(SessionKind::ALL.contains(&SessionKind::Screenshot));
    assert!(SessionKind::ALL.contains(&SessionKind::Lifecycle));
}

#[tokio::test]
async fn test_pool_state_reuses_live_sessions() {
    let mut state = PoolState::default();
    let session = test_session("s1");
    state.insert_pooled(SessionKind::Dom, session.clone());

    let found = state.pooled(SessionKind::Dom).unwrap();
    assert_eq!(found.id(), "s1");
    assert!(state.pooled(SessionKind::Screenshot).is_none());
}

#[tokio::test]
async fn test_pool_state_drops_detached_sessions() {
    let mut state = PoolState::default();
    let session = test_session("s1");
    state.insert_pooled(SessionKind::Dom, session.clone());

    session.mark_detached();
    assert!(state.pooled(SessionKind::Dom).is_none());
}

#[tokio::test]
async fn test_invalidate_marks_and_removes_by_id() {
    let mut state = PoolState::default();
    let pooled = test_session("pooled");
    let child = test_session("child");
    state.insert_pooled(SessionKind::Lifecycle, pooled.clone());
    state.insert_child(child.clone());

    assert!(state.invalidate("child"));
    assert!(child.is_detached());
    assert!(!pooled.is_detached());

    assert!(state.invalidate("pooled"));
    assert!(pooled.is_detached());
    assert!(!state.invalidate("unknown"));
}

#[tokio::test]
async fn test_drain_for_close_takes_everything_and_closes() {
    let mut state = PoolState::default();
    state.insert_pooled(SessionKind::Dom, test_session("a"));
    state.insert_pooled(SessionKind::Screenshot, test_session("b"));
    state.insert_child(test_session("c"));

    let drained = state.drain_for_close();
    assert_eq!(drained.len(), 3);
    assert!(state.is_closed());
    assert!(state.drain_for_close().is_empty());
}

#[tokio::test]
async fn test_pooled_after_close_is_target_closed() {
    let pool = SessionPool::new(Arc::new(CdpConnection::disconnected()), "T1");
    pool.close().await;
    let err = pool.pooled(SessionKind::Dom).await.unwrap_err();
    assert!(matches!(err, CdpError::TargetClosed));
}

#[tokio::test]
async fn test_detached_session_refuses_commands() {
    let session = test_session("gone");
    session.mark_detached();
    let err = session
        .send_command::<(), serde_json::Value>("Page.enable", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CdpError::SessionDetached(_)));
}
