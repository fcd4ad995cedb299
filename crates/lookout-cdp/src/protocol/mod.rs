//! CDP protocol domain types.
//!
//! Typed parameter/result structs for the subset of the protocol the
//! observation engine drives. Field names follow the wire format via serde
//! renames; optional parameters are skipped when unset.

pub mod accessibility;
pub mod dom;
pub mod input;
pub mod network;
pub mod page;
pub mod runtime;
pub mod target_domain;
