//! # Lookout CDP - Chrome DevTools Protocol transport
//!
//! Low-level Chrome DevTools Protocol (CDP) implementation over WebSocket,
//! providing the transport and session layer for the Lookout observation
//! engine.
//!
//! This crate handles:
//! - WebSocket connection management to Chrome/Chromium browsers
//! - CDP message serialization and deserialization
//! - Command/response handling with async/await
//! - Event subscription and streaming
//! - Session pooling for a page target and child sessions for
//!   out-of-process iframes (OOPIFs)
//!
//! ## Sending Commands
//!
//! Commands are sent with optional session IDs for target-specific
//! operations:
//!
//! ```no_run
//! use lookout_cdp::CdpConnection;
//! use lookout_cdp::protocol::page::NavigateParams;
//!
//! # async fn example(conn: &CdpConnection, session_id: &str) -> Result<(), lookout_cdp::CdpError> {
//! let result: lookout_cdp::protocol::page::NavigateResult = conn.send_command(
//!     "Page.navigate",
//!     Some(NavigateParams {
//!         url: "https://example.com".to_string(),
//!         frame_id: None,
//!     }),
//!     Some(session_id),
//! ).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Sessions
//!
//! A [`SessionPool`] owns all flattened sessions attached to one page
//! target. Sessions are pooled by [`SessionKind`] so that independent
//! concerns (DOM traversal, screenshots, lifecycle tracking) do not share
//! a command stream:
//!
//! ```no_run
//! use lookout_cdp::{SessionKind, SessionPool};
//!
//! # async fn example(pool: &SessionPool) -> Result<(), lookout_cdp::CdpError> {
//! let dom = pool.pooled(SessionKind::Dom).await?;
//! let lifecycle = pool.pooled(SessionKind::Lifecycle).await?;
//! assert_ne!(dom.id(), lifecycle.id());
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use connection::discovery::{BrowserVersion, CdpConnectionOptions, discover_websocket_url};
pub use connection::CdpConnection;
pub use error::CdpError;
pub use session::{CdpSession, SessionKind, SessionPool};
pub use transport::{CdpEvent, CdpMessage, CdpRequest, CdpResponse, CdpResponseError};
