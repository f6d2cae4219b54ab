//! Study session state machine
//!
//! `Idle --start--> Active --complete--> Idle`, with the reward paid on
//! `complete`. A member without a record is Idle.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ConflictReason, Error, Result};
use crate::store::Lookup;
use crate::types::{MemberId, ProgressionRecord, StudyState};

use super::{Core, ProgressUpdate, RoleSync};

/// Result of a successful `start`
#[derive(Debug, Clone, Serialize)]
pub struct SessionStarted {
    /// The record was created by this call
    pub created: bool,
    pub record: ProgressionRecord,
    /// Set when a stale stored rank was corrected on the way
    pub role_sync: RoleSync,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub struct StudySessionManager {
    core: Arc<Core>,
}

impl StudySessionManager {
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self { core }
    }

    /// Current session state; absent records are Idle
    pub async fn state(&self, member_id: &MemberId) -> Result<StudyState> {
        Ok(self
            .core
            .store
            .get(member_id)
            .await?
            .map(|record| record.study_state())
            .unwrap_or(StudyState::Idle))
    }

    /// Open a session, creating the member's record on first use
    pub async fn start(&self, member_id: &MemberId, display_name: &str) -> Result<SessionStarted> {
        let (record, created, drift) = {
            let _guard = self.core.locks.acquire(member_id).await;

            let candidate =
                ProgressionRecord::implicit(member_id.clone(), display_name, self.core.ranks.floor());
            let (mut record, created) = match self.core.store.get_or_create(candidate).await? {
                Lookup::Created(record) => {
                    info!(member_id = %member_id, rank = %record.rank, "Record created by first study session");
                    (record, true)
                }
                Lookup::Found(record) => (record, false),
            };

            if record.study_state() == StudyState::Active {
                return Err(Error::conflict(member_id, ConflictReason::SessionAlreadyActive));
            }

            let drift = record.realign(&self.core.ranks);
            record.set_study_state(StudyState::Active);
            self.core.store.upsert(record.clone()).await?;
            (record, created, drift)
        };
        debug!(member_id = %member_id, "Study session started");

        let mut warnings = Vec::new();
        let role_sync = match &drift {
            Some(change) => self.core.apply_rank_change(&record, change, &mut warnings).await,
            None => RoleSync::Unchanged,
        };

        Ok(SessionStarted {
            created,
            record,
            role_sync,
            warnings,
        })
    }

    /// Close the active session and pay the study reward
    pub async fn complete(&self, member_id: &MemberId) -> Result<ProgressUpdate> {
        let reward = self.core.settings.study_reward;

        let (record, change) = {
            let _guard = self.core.locks.acquire(member_id).await;

            let mut record = match self.core.store.get(member_id).await? {
                Some(record) if record.study_state() == StudyState::Active => record,
                _ => return Err(Error::conflict(member_id, ConflictReason::NoActiveSession)),
            };

            let change = record.add_points(reward, &self.core.ranks);
            record.set_study_state(StudyState::Idle);
            self.core.store.upsert(record.clone()).await?;
            (record, change)
        };

        info!(
            member_id = %member_id,
            reward,
            points = record.points,
            rank = %record.rank,
            "Study session completed"
        );

        Ok(self.core.settle(record, reward, change).await)
    }
}
