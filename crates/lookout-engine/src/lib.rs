//! # Lookout Engine - frame-aware page observation and action dispatch
//!
//! Lookout turns a live CDP connection into something a language model can
//! drive: a merged accessibility-plus-DOM snapshot spanning the main
//! frame, same-origin iframes, and out-of-process iframes (OOPIFs), plus
//! precise dispatch of element interactions addressed by stable ids.
//!
//! The hard part is reconciliation. Four disjoint identifier spaces (DOM
//! backend node ids, accessibility node ids, frame ids, execution context
//! ids) arrive from independent CDP domains and events; the engine merges
//! them into one addressing scheme, the [`EncodedId`], and routes every
//! action to the correct session and JavaScript context.
//!
//! ## Observation
//!
//! ```no_run
//! use lookout_engine::{Engine, ObserveOptions};
//!
//! # async fn example(engine: &Engine, page: &lookout_engine::Page) -> Result<(), lookout_engine::EngineError> {
//! let snapshot = engine.observe(page, ObserveOptions::default()).await?;
//! println!("{}", snapshot.dom_state);
//! # Ok(())
//! # }
//! ```
//!
//! ## Action dispatch
//!
//! ```no_run
//! use lookout_engine::Engine;
//!
//! # async fn example(
//! #     engine: &Engine,
//! #     page: &lookout_engine::Page,
//! #     snapshot: std::sync::Arc<lookout_engine::Snapshot>,
//! # ) -> Result<(), lookout_engine::EngineError> {
//! let outcome = engine
//!     .execute_action(page, &snapshot, "0-42", "click", &[])
//!     .await?;
//! assert!(outcome.ok, "{}", outcome.message);
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod capture;
pub mod config;
pub mod debug;
pub mod driver;
pub mod encoded_id;
pub mod engine;
pub mod error;
pub mod frame_graph;
pub mod llm;
pub mod overlay;
pub mod resolver;
pub mod settle;
pub mod snapshot;

pub use actions::{Action, ActionOutcome};
pub use config::{EngineConfig, ObserveOptions};
pub use driver::{BrowserAdapter, CdpBrowserAdapter, FrameDescriptor, Page};
pub use encoded_id::EncodedId;
pub use engine::Engine;
pub use error::{
    ActionError, CaptureError, EngineError, FrameGraphError, LlmError, ResolveError,
};
pub use frame_graph::FrameGraph;
pub use llm::{FindOutcome, FoundElement, LanguageModel, Message, Role, StructuredReply};
pub use snapshot::{AccessibilityNode, IframeInfo, Rect, Snapshot};
