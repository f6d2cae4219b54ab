//! Persistence boundary for progression records
//!
//! The store is the only place records are mutated. Callers serialize
//! read-modify-write sequences per member (see `progression::MemberLocks`);
//! implementations only need read-your-writes per key.

mod file;
mod memory;

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{MemberId, ProgressionRecord};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

// ─────────────────────────────────────────────────────────────────
// Lookup
// ─────────────────────────────────────────────────────────────────

/// Result of a get-or-create
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// No record existed; the candidate was stored
    Created(ProgressionRecord),
    /// An existing record was found and left untouched
    Found(ProgressionRecord),
}

impl Lookup {
    pub fn was_created(&self) -> bool {
        matches!(self, Lookup::Created(_))
    }

    pub fn record(&self) -> &ProgressionRecord {
        match self {
            Lookup::Created(record) | Lookup::Found(record) => record,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// ProgressionStore Trait
// ─────────────────────────────────────────────────────────────────

/// Storage contract for progression records
#[async_trait]
pub trait ProgressionStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Fetch a member's record
    async fn get(&self, member_id: &MemberId) -> Result<Option<ProgressionRecord>>;

    /// Create or replace the record keyed by its member id
    async fn upsert(&self, record: ProgressionRecord) -> Result<()>;

    /// Up to `n` records, best first, see [`leaderboard_order`]
    async fn top_by_points(&self, n: usize) -> Result<Vec<ProgressionRecord>>;

    /// Number of stored records
    async fn count(&self) -> Result<usize>;

    /// Return the existing record, or store `candidate` if there is none
    async fn get_or_create(&self, candidate: ProgressionRecord) -> Result<Lookup> {
        if let Some(existing) = self.get(&candidate.member_id).await? {
            return Ok(Lookup::Found(existing));
        }
        self.upsert(candidate.clone()).await?;
        Ok(Lookup::Created(candidate))
    }
}

/// Descending points, ties broken by ascending member id
pub fn leaderboard_order(a: &ProgressionRecord, b: &ProgressionRecord) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| a.member_id.cmp(&b.member_id))
}

/// Sort and truncate a full record set for `top_by_points`
pub(crate) fn top_n(mut records: Vec<ProgressionRecord>, n: usize) -> Vec<ProgressionRecord> {
    records.sort_by(leaderboard_order);
    records.truncate(n);
    records
}
