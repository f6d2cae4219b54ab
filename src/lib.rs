//! Rank progression engine for the School of Rebels community
//!
//! Members earn points through study sessions (or administrator grants),
//! points derive a rank from an ordered rank table, and every rank change
//! is reflected in the member's platform roles.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod progression;
pub mod ranks;
pub mod roles;
pub mod store;
pub mod types;
pub mod version;

pub use error::{Error, Result};
pub use progression::Progression;
