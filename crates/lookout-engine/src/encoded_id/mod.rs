//! The engine's stable element address.
//!
//! An [`EncodedId`] is `"<frameIndex>-<backendNodeId>"`: the frame index
//! assigned by depth-first DOM traversal (main frame = 0) joined to the
//! per-document backend node id reported by CDP. It is the key of every
//! per-element map in a snapshot and the only element address the model
//! ever sees.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// A stable element address, `"<frameIndex>-<backendNodeId>"`.
///
/// Both components are non-negative decimal integers without leading
/// zeros. Parsing and formatting round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodedId {
    /// Depth-first frame index; 0 is the main frame.
    pub frame_index: u64,
    /// Backend node id within that frame's document.
    pub backend_node_id: u64,
}

impl EncodedId {
    /// Build an id from its components.
    pub fn new(frame_index: u64, backend_node_id: u64) -> Self {
        Self {
            frame_index,
            backend_node_id,
        }
    }

    /// Whether this id addresses the main frame.
    pub fn is_main_frame(&self) -> bool {
        self.frame_index == 0
    }
}

impl fmt::Display for EncodedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.frame_index, self.backend_node_id)
    }
}

/// A decimal integer without sign or leading zeros.
fn parse_component(s: &str) -> Option<u64> {
    if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for EncodedId {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ResolveError::BadRequest(format!("malformed encoded id: {s:?}"));
        let (frame, node) = s.split_once('-').ok_or_else(bad)?;
        let frame_index = parse_component(frame).ok_or_else(bad)?;
        let backend_node_id = parse_component(node).ok_or_else(bad)?;
        Ok(Self {
            frame_index,
            backend_node_id,
        })
    }
}

impl Serialize for EncodedId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EncodedId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests;
