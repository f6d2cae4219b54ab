//! Leaderboard view over the store's ordering

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::types::MemberId;

use super::Core;

/// One leaderboard row; positions start at 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub position: usize,
    pub member_id: MemberId,
    pub display_name: String,
    pub points: u64,
    pub rank: String,
}

pub struct LeaderboardQuery {
    core: Arc<Core>,
}

impl LeaderboardQuery {
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self { core }
    }

    /// First `n` members by points, ties by ascending member id.
    ///
    /// Ranks are derived from the current table, not read from the store.
    pub async fn top(&self, n: usize) -> Result<Vec<LeaderboardEntry>> {
        let records = self.core.store.top_by_points(n).await?;
        Ok(records
            .into_iter()
            .enumerate()
            .map(|(index, record)| LeaderboardEntry {
                position: index + 1,
                member_id: record.member_id,
                display_name: record.display_name,
                rank: self.core.ranks.rank_for(record.points).name.clone(),
                points: record.points,
            })
            .collect())
    }

    /// Top of the board at the configured size
    pub async fn top_default(&self) -> Result<Vec<LeaderboardEntry>> {
        self.top(self.core.settings.leaderboard_size).await
    }
}
