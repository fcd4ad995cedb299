//! Session management for a page target.
//!
//! One page is served by several flattened CDP sessions. Pooled sessions
//! are keyed by [`SessionKind`] so that independent concerns (DOM
//! traversal, screenshots, lifecycle tracking) do not interleave on one
//! command stream. Child sessions attach to sub-targets and are how
//! out-of-process iframes are reached.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use crate::connection::CdpConnection;
use crate::error::CdpError;
use crate::protocol::target_domain::{
    AttachToTargetParams, AttachToTargetResult, DetachFromTargetParams, DetachedFromTargetEvent,
};

/// Purpose-keyed classes of pooled sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// DOM and accessibility traversal.
    Dom,
    /// Screenshot capture.
    Screenshot,
    /// Network lifecycle tracking (DOM settle).
    Lifecycle,
}

impl SessionKind {
    /// All pool kinds, for teardown iteration.
    pub const ALL: [SessionKind; 3] = [Self::Dom, Self::Screenshot, Self::Lifecycle];
}

/// A flattened CDP session bound to one target.
#[derive(Debug)]
pub struct CdpSession {
    connection: Arc<CdpConnection>,
    session_id: String,
    detached: AtomicBool,
}

impl CdpSession {
    fn new(connection: Arc<CdpConnection>, session_id: String) -> Self {
        Self {
            connection,
            session_id,
            detached: AtomicBool::new(false),
        }
    }

    /// The CDP session identifier.
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// The connection this session is multiplexed over.
    pub fn connection(&self) -> &Arc<CdpConnection> {
        &self.connection
    }

    /// Whether the browser has detached this session.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    pub(crate) fn mark_detached(&self) {
        self.detached.store(true, Ordering::Release);
    }

    /// Send a command on this session.
    ///
    /// # Errors
    ///
    /// Returns [`CdpError::SessionDetached`] when the session is gone,
    /// otherwise whatever the underlying connection reports.
    pub async fn send_command<P, R>(&self, method: &str, params: Option<P>) -> Result<R, CdpError>
    where
        P: serde::Serialize,
        R: DeserializeOwned,
    {
        if self.is_detached() {
            return Err(CdpError::SessionDetached(self.session_id.clone()));
        }
        self.connection
            .send_command(method, params, Some(&self.session_id))
            .await
    }

    /// Send a command on this session with a caller-supplied deadline.
    ///
    /// # Errors
    ///
    /// Same as [`send_command`](Self::send_command), plus
    /// [`CdpError::Timeout`] when the deadline elapses.
    pub async fn send_command_with_timeout<P, R>(
        &self,
        method: &str,
        params: Option<P>,
        deadline: std::time::Duration,
    ) -> Result<R, CdpError>
    where
        P: serde::Serialize,
        R: DeserializeOwned,
    {
        if self.is_detached() {
            return Err(CdpError::SessionDetached(self.session_id.clone()));
        }
        self.connection
            .send_command_with_timeout(method, params, Some(&self.session_id), deadline)
            .await
    }

    /// Subscribe to events on the underlying connection.
    ///
    /// The receiver sees events from every session; filter with
    /// [`CdpEvent::is_from_session`](crate::transport::CdpEvent::is_from_session).
    pub fn subscribe_events(&self) -> broadcast::Receiver<crate::transport::CdpEvent> {
        self.connection.subscribe_events()
    }
}

/// Bookkeeping for pooled and child sessions.
///
/// Kept free of I/O so invalidation logic is testable; the pool wraps it
/// with the attach/detach plumbing.
#[derive(Debug, Default)]
pub(crate) struct PoolState {
    pooled: HashMap<SessionKind, Arc<CdpSession>>,
    children: Vec<Arc<CdpSession>>,
    closed: bool,
}

impl PoolState {
    pub(crate) fn pooled(&self, kind: SessionKind) -> Option<Arc<CdpSession>> {
        self.pooled.get(&kind).filter(|s| !s.is_detached()).cloned()
    }

    pub(crate) fn insert_pooled(&mut self, kind: SessionKind, session: Arc<CdpSession>) {
        self.pooled.insert(kind, session);
    }

    pub(crate) fn insert_child(&mut self, session: Arc<CdpSession>) {
        self.children.push(session);
    }

    /// Invalidate every reference to a detached session id.
    ///
    /// Returns whether anything was dropped.
    pub(crate) fn invalidate(&mut self, session_id: &str) -> bool {
        let mut dropped = false;
        self.pooled.retain(|_, session| {
            if session.id() == session_id {
                session.mark_detached();
                dropped = true;
                false
            } else {
                true
            }
        });
        self.children.retain(|session| {
            if session.id() == session_id {
                session.mark_detached();
                dropped = true;
                false
            } else {
                true
            }
        });
        dropped
    }

    /// Take every tracked session for teardown and mark the pool closed.
    pub(crate) fn drain_for_close(&mut self) -> Vec<Arc<CdpSession>> {
        self.closed = true;
        let mut all: Vec<_> = self.pooled.drain().map(|(_, s)| s).collect();
        all.append(&mut self.children);
        all
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Pool of CDP sessions serving one page target.
///
/// The pool exclusively owns its sessions; consumers borrow them and never
/// close them. On page close every tracked session is detached in
/// parallel; failures are logged, not propagated.
#[derive(Debug)]
pub struct SessionPool {
    connection: Arc<CdpConnection>,
    target_id: String,
    state: Arc<Mutex<PoolState>>,
}

impl SessionPool {
    /// Create a pool for a page target and start watching for detach
    /// events so stale pooled references are invalidated eagerly.
    pub fn new(connection: Arc<CdpConnection>, target_id: impl Into<String>) -> Self {
        let pool = Self {
            connection,
            target_id: target_id.into(),
            state: Arc::new(Mutex::new(PoolState::default())),
        };
        pool.spawn_detach_watcher();
        pool
    }

    /// The page target this pool serves.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Arc<CdpConnection> {
        &self.connection
    }

    fn spawn_detach_watcher(&self) {
        let mut events = self.connection.subscribe_events();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if event.method != "Target.detachedFromTarget" {
                    continue;
                }
                let Some(detached) = event.parse_params::<DetachedFromTargetEvent>() else {
                    continue;
                };
                if state.lock().invalidate(&detached.session_id) {
                    debug!(session_id = %detached.session_id, "pooled session invalidated on detach");
                }
            }
        });
    }

    /// Get or lazily create the pooled session of the given kind.
    ///
    /// Detached pooled references are re-acquired transparently.
    ///
    /// # Errors
    ///
    /// Returns [`CdpError::TargetClosed`] after [`close`](Self::close),
    /// or an attach failure from the browser.
    #[instrument(level = "debug", skip(self), fields(target_id = %self.target_id, kind = ?kind))]
    pub async fn pooled(&self, kind: SessionKind) -> Result<Arc<CdpSession>, CdpError> {
        {
            let state = self.state.lock();
            if state.is_closed() {
                return Err(CdpError::TargetClosed);
            }
            if let Some(session) = state.pooled(kind) {
                return Ok(session);
            }
        }

        let session = self.attach(&self.target_id).await?;
        debug!(session_id = %session.id(), "pooled session attached");

        let mut state = self.state.lock();
        if state.is_closed() {
            return Err(CdpError::TargetClosed);
        }
        state.insert_pooled(kind, session.clone());
        Ok(session)
    }

    /// Attach a dedicated session to a sub-target.
    ///
    /// Used to probe candidate frames for out-of-process isolation: only a
    /// frame backed by its own target accepts the attach.
    ///
    /// # Errors
    ///
    /// Returns the browser's attach failure; for same-process frames this
    /// is the expected outcome and callers treat it as a classification,
    /// not a fault.
    #[instrument(level = "debug", skip(self))]
    pub async fn new_child_session(&self, target_id: &str) -> Result<Arc<CdpSession>, CdpError> {
        if self.state.lock().is_closed() {
            return Err(CdpError::TargetClosed);
        }
        let session = self.attach(target_id).await?;
        debug!(session_id = %session.id(), child_target = %target_id, "child session attached");
        self.state.lock().insert_child(session.clone());
        Ok(session)
    }

    async fn attach(&self, target_id: &str) -> Result<Arc<CdpSession>, CdpError> {
        let result: AttachToTargetResult = self
            .connection
            .send_command(
                "Target.attachToTarget",
                Some(AttachToTargetParams {
                    target_id: target_id.to_string(),
                    flatten: Some(true),
                }),
                None,
            )
            .await?;
        Ok(Arc::new(CdpSession::new(
            self.connection.clone(),
            result.session_id,
        )))
    }

    /// Detach every tracked session in parallel and close the pool.
    ///
    /// Idempotent. Detach failures are logged and swallowed; the page is
    /// going away either way.
    #[instrument(level = "debug", skip(self), fields(target_id = %self.target_id))]
    pub async fn close(&self) {
        let sessions = self.state.lock().drain_for_close();
        if sessions.is_empty() {
            return;
        }

        let detaches = sessions.into_iter().map(|session| {
            let connection = self.connection.clone();
            async move {
                session.mark_detached();
                let result: Result<serde_json::Value, _> = connection
                    .send_command(
                        "Target.detachFromTarget",
                        Some(DetachFromTargetParams {
                            session_id: Some(session.id().to_string()),
                        }),
                        None,
                    )
                    .await;
                if let Err(e) = result {
                    warn!(session_id = %session.id(), error = %e, "session detach failed");
                }
            }
        });
        futures_util::future::join_all(detaches).await;
    }
}

#[cfg(test)]
mod tests;
