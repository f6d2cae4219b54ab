//! Type definitions for rebels-progress
//!
//! Identifiers handed to us by the chat platform and the per-member
//! progression record persisted by the store.

mod ids;
mod record;

pub use ids::*;
pub use record::*;
