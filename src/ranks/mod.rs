//! Rank tiers and school directory
//!
//! Both tables are built from configuration once at startup and validated
//! before any command is served.

mod schools;
mod table;

pub use schools::{School, SchoolDirectory};
pub use table::{RankTable, RankTier};
