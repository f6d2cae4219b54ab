//! Direct point adjustment
//!
//! Bypasses the study session state machine; the session flag is left as is.

use std::sync::Arc;

use tracing::info;

use crate::error::{Error, Result};
use crate::types::MemberId;

use super::{Core, ProgressUpdate};

pub struct PointAdjuster {
    core: Arc<Core>,
}

impl PointAdjuster {
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self { core }
    }

    /// Add `delta` points to an existing record
    pub async fn add_points(&self, member_id: &MemberId, delta: u64) -> Result<ProgressUpdate> {
        if delta == 0 {
            return Err(Error::invalid_input("delta", "must be a positive integer"));
        }

        let (record, change) = {
            let _guard = self.core.locks.acquire(member_id).await;

            let mut record = self
                .core
                .store
                .get(member_id)
                .await?
                .ok_or_else(|| Error::not_found(member_id))?;
            let change = record.add_points(delta, &self.core.ranks);
            self.core.store.upsert(record.clone()).await?;
            (record, change)
        };

        info!(
            member_id = %member_id,
            delta,
            points = record.points,
            rank = %record.rank,
            "Points added"
        );

        Ok(self.core.settle(record, delta, change).await)
    }
}
