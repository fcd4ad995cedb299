//! The browser boundary.
//!
//! The engine needs exactly three things from a browser driver: a root
//! CDP session for a page, an enumeration of the page's frames, and a
//! way to open a child CDP session for a frame (which is also how OOPIFs
//! are detected: only frames backed by their own target accept the
//! attach). [`BrowserAdapter`] captures that contract;
//! [`CdpBrowserAdapter`] implements it with nothing but the protocol.

use std::sync::Arc;

use tracing::{debug, instrument};

use lookout_cdp::protocol::page::{FrameTree, GetFrameTreeResult};
use lookout_cdp::protocol::target_domain::{GetTargetsParams, GetTargetsResult};
use lookout_cdp::{CdpConnection, CdpError, CdpSession, SessionKind, SessionPool};

/// A handle to one browser page.
///
/// Owns the session pool for the page's target. The root session is the
/// DOM-pooled session; the frame graph and main-frame capture run on it.
#[derive(Debug)]
pub struct Page {
    pool: Arc<SessionPool>,
    root_session: Arc<CdpSession>,
}

impl Page {
    /// Attach to a page target over an existing connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial session attach fails.
    #[instrument(level = "debug", skip(connection))]
    pub async fn attach(
        connection: Arc<CdpConnection>,
        target_id: &str,
    ) -> Result<Self, CdpError> {
        let pool = Arc::new(SessionPool::new(connection, target_id));
        let root_session = pool.pooled(SessionKind::Dom).await?;
        debug!(session_id = %root_session.id(), "page attached");
        Ok(Self { pool, root_session })
    }

    /// The page's target id; also the engine's page key.
    pub fn target_id(&self) -> &str {
        self.pool.target_id()
    }

    /// The session the frame graph and main-frame capture run on.
    pub fn root_session(&self) -> &Arc<CdpSession> {
        &self.root_session
    }

    /// The session pool for this page.
    pub fn session_pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }
}

/// One frame as reported by the browser driver.
#[derive(Debug, Clone)]
pub struct FrameDescriptor {
    /// Frame document URL.
    pub url: String,
    /// Frame name, when the embedding element carries one.
    pub name: Option<String>,
    /// URL of the parent frame's document; `None` for the main frame.
    pub parent_url: Option<String>,
    /// Backing target id, present only for frames isolated into their
    /// own target (OOPIF candidates).
    pub target_id: Option<String>,
}

/// The three operations the engine requires of a browser driver.
pub trait BrowserAdapter: Send + Sync + 'static {
    /// Enumerate the page's frames: the in-process frame tree plus any
    /// frames isolated into dedicated targets.
    fn frames(
        &self,
        page: &Page,
    ) -> impl Future<Output = Result<Vec<FrameDescriptor>, CdpError>> + Send;

    /// Open a dedicated child session for a frame.
    ///
    /// Succeeds only for frames backed by their own target; the failure
    /// for in-process frames is how callers classify them as same-origin.
    fn open_child_session(
        &self,
        page: &Page,
        descriptor: &FrameDescriptor,
    ) -> impl Future<Output = Result<Arc<CdpSession>, CdpError>> + Send;
}

/// Driver implementation over raw CDP.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdpBrowserAdapter;

impl CdpBrowserAdapter {
    fn collect_tree(
        tree: &FrameTree,
        parent_url: Option<&str>,
        out: &mut Vec<FrameDescriptor>,
    ) {
        out.push(FrameDescriptor {
            url: tree.frame.url.clone(),
            name: tree.frame.name.clone(),
            parent_url: parent_url.map(ToString::to_string),
            target_id: None,
        });
        if let Some(children) = &tree.child_frames {
            for child in children {
                Self::collect_tree(child, Some(&tree.frame.url), out);
            }
        }
    }
}

impl BrowserAdapter for CdpBrowserAdapter {
    /// Merge the root session's frame tree (in-process frames) with the
    /// browser's iframe targets (OOPIF candidates).
    #[instrument(level = "debug", skip(self, page), fields(target_id = %page.target_id()))]
    async fn frames(&self, page: &Page) -> Result<Vec<FrameDescriptor>, CdpError> {
        let mut descriptors = Vec::new();

        let tree: GetFrameTreeResult = page
            .root_session()
            .send_command("Page.getFrameTree", None::<()>)
            .await?;
        let main_url = tree.frame_tree.frame.url.clone();
        Self::collect_tree(&tree.frame_tree, None, &mut descriptors);

        let targets: GetTargetsResult = page
            .root_session()
            .connection()
            .send_command("Target.getTargets", Some(GetTargetsParams::default()), None)
            .await?;
        for target in targets.target_infos {
            if target.target_type != "iframe" {
                continue;
            }
            descriptors.push(FrameDescriptor {
                url: target.url,
                name: None,
                parent_url: Some(main_url.clone()),
                target_id: Some(target.target_id),
            });
        }

        debug!(count = descriptors.len(), "frames enumerated");
        Ok(descriptors)
    }

    async fn open_child_session(
        &self,
        page: &Page,
        descriptor: &FrameDescriptor,
    ) -> Result<Arc<CdpSession>, CdpError> {
        let Some(target_id) = &descriptor.target_id else {
            return Err(CdpError::NoSuchTarget(descriptor.url.clone()));
        };
        page.session_pool().new_child_session(target_id).await
    }
}
