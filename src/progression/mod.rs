//! Progression engine
//!
//! Ties the rank table, the store, role reconciliation and notifications
//! together. Every command follows the same shape:
//!
//! 1. take the member's lock
//! 2. read the record, check the state machine, compute the new state
//! 3. write it back and release the lock
//! 4. reconcile roles and publish events (only when the rank changed)
//!
//! Step 4 runs outside the lock; its failures become warnings on the
//! result, never errors, because the record is already committed.

mod leaderboard;
mod locks;
mod points;
mod registration;
mod session;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{ProgressionSettings, ServiceConfig};
use crate::error::{Error, Result};
use crate::notify::{self, Notifier, ProgressEvent};
use crate::ranks::{RankTable, SchoolDirectory};
use crate::roles::{ReconcileReport, RoleDirectory, RoleReconciler};
use crate::store::{JsonFileStore, MemoryStore, ProgressionStore};
use crate::types::{MemberId, ProgressionRecord, RankChange, RoleId};

pub use leaderboard::{LeaderboardEntry, LeaderboardQuery};
pub use locks::{MemberGuard, MemberLocks};
pub use points::PointAdjuster;
pub use registration::{Registered, Registration, RegistrationService};
pub use session::{SessionStarted, StudySessionManager};

// ─────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────

/// What happened to the member's roles after a point change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoleSync {
    /// Rank did not change, roles were not touched
    Unchanged,
    /// Roles now match the stored rank
    Applied {
        removed: Vec<RoleId>,
        added: Option<RoleId>,
    },
    /// The role collaborator failed; progress is kept and `resync` can retry
    Failed { error: String },
}

/// Result of any operation that adds points
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub member_id: MemberId,
    pub display_name: String,
    pub points_awarded: u64,
    pub points: u64,
    pub rank: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_change: Option<RankChange>,
    pub role_sync: RoleSync,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// A member's record plus progress toward the next rank
#[derive(Debug, Clone, Serialize)]
pub struct MemberProfile {
    pub record: ProgressionRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_rank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_to_next: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────
// Shared Core
// ─────────────────────────────────────────────────────────────────

pub(crate) struct Core {
    store: Arc<dyn ProgressionStore>,
    ranks: Arc<RankTable>,
    schools: Arc<SchoolDirectory>,
    reconciler: RoleReconciler,
    notifier: Arc<dyn Notifier>,
    locks: MemberLocks,
    settings: ProgressionSettings,
}

impl Core {
    /// Reconcile roles and announce a committed point change
    async fn settle(
        &self,
        record: ProgressionRecord,
        points_awarded: u64,
        rank_change: Option<RankChange>,
    ) -> ProgressUpdate {
        let mut warnings = Vec::new();
        let role_sync = match &rank_change {
            None => RoleSync::Unchanged,
            Some(change) => self.apply_rank_change(&record, change, &mut warnings).await,
        };

        ProgressUpdate {
            member_id: record.member_id,
            display_name: record.display_name,
            points_awarded,
            points: record.points,
            rank: record.rank,
            rank_change,
            role_sync,
            warnings,
        }
    }

    /// Bring roles in line with a committed rank change and publish it
    async fn apply_rank_change(
        &self,
        record: &ProgressionRecord,
        change: &RankChange,
        warnings: &mut Vec<String>,
    ) -> RoleSync {
        info!(
            member_id = %record.member_id,
            from = %change.from,
            to = %change.to,
            points = record.points,
            "Rank changed"
        );

        let target = self.current_rank(&record.member_id, &change.to).await;
        let role_sync = match self
            .reconciler
            .reconcile(&record.member_id, &change.from, &target)
            .await
        {
            Ok(report) => RoleSync::Applied {
                removed: report.removed,
                added: report.added,
            },
            Err(e) => {
                warn!(
                    member_id = %record.member_id,
                    error = %e,
                    "Role reconciliation failed, progress kept"
                );
                warnings.push(e.to_string());
                RoleSync::Failed { error: e.to_string() }
            }
        };

        let event = ProgressEvent::rank_changed(record, change);
        if let Some(warning) = notify::publish_or_warn(self.notifier.as_ref(), event).await {
            warnings.push(warning);
        }

        role_sync
    }

    /// Rank the table derives for the member's stored points right now.
    ///
    /// A concurrent command may have moved the member past `fallback` after
    /// our lock was released; reconciling toward the stored points keeps
    /// roles from regressing.
    async fn current_rank(&self, member_id: &MemberId, fallback: &str) -> String {
        match self.store.get(member_id).await {
            Ok(Some(current)) => self.ranks.rank_for(current.points).name.clone(),
            Ok(None) => fallback.to_string(),
            Err(e) => {
                warn!(member_id = %member_id, error = %e, "Could not re-read record before reconciling");
                fallback.to_string()
            }
        }
    }

    /// Stored record with its rank re-derived from the current table
    async fn read(&self, member_id: &MemberId) -> Result<Option<ProgressionRecord>> {
        Ok(self.store.get(member_id).await?.map(|mut record| {
            record.realign(&self.ranks);
            record
        }))
    }
}

// ─────────────────────────────────────────────────────────────────
// Progression Facade
// ─────────────────────────────────────────────────────────────────

/// Entry point owning every progression service
pub struct Progression {
    core: Arc<Core>,
    sessions: StudySessionManager,
    registration: RegistrationService,
    points: PointAdjuster,
    leaderboard: LeaderboardQuery,
}

impl Progression {
    pub fn new(
        store: Arc<dyn ProgressionStore>,
        ranks: Arc<RankTable>,
        schools: Arc<SchoolDirectory>,
        roles: Arc<dyn RoleDirectory>,
        notifier: Arc<dyn Notifier>,
        settings: ProgressionSettings,
    ) -> Self {
        let reconciler = RoleReconciler::new(ranks.clone(), roles, settings.retry_policy());
        let core = Arc::new(Core {
            store,
            ranks,
            schools,
            reconciler,
            notifier,
            locks: MemberLocks::new(),
            settings,
        });

        Self {
            sessions: StudySessionManager::new(core.clone()),
            registration: RegistrationService::new(core.clone()),
            points: PointAdjuster::new(core.clone()),
            leaderboard: LeaderboardQuery::new(core.clone()),
            core,
        }
    }

    /// Build the engine from configuration, opening the configured store
    pub fn from_config(
        config: &ServiceConfig,
        roles: Arc<dyn RoleDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let store: Arc<dyn ProgressionStore> = match config.store_path() {
            Some(path) => Arc::new(JsonFileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        let ranks = Arc::new(config.rank_table()?);
        let schools = Arc::new(config.school_directory()?);

        info!(
            store = store.name(),
            roles = roles.name(),
            ranks = ranks.len(),
            schools = schools.schools().len(),
            "Progression engine ready"
        );

        Ok(Self::new(
            store,
            ranks,
            schools,
            roles,
            notifier,
            config.progression.clone(),
        ))
    }

    pub fn sessions(&self) -> &StudySessionManager {
        &self.sessions
    }

    pub fn registration(&self) -> &RegistrationService {
        &self.registration
    }

    pub fn points(&self) -> &PointAdjuster {
        &self.points
    }

    pub fn leaderboard(&self) -> &LeaderboardQuery {
        &self.leaderboard
    }

    pub fn ranks(&self) -> &RankTable {
        &self.core.ranks
    }

    pub fn store(&self) -> &dyn ProgressionStore {
        self.core.store.as_ref()
    }

    /// Stored record with progress toward the next rank
    pub async fn profile(&self, member_id: &MemberId) -> Result<MemberProfile> {
        let record = self
            .core
            .read(member_id)
            .await?
            .ok_or_else(|| Error::not_found(member_id))?;

        let next = self.core.ranks.next_tier(record.points);
        Ok(MemberProfile {
            next_rank: next.map(|(tier, _)| tier.name.clone()),
            points_to_next: next.map(|(_, missing)| missing),
            record,
        })
    }

    /// Re-run role reconciliation toward the member's rank.
    ///
    /// A stored rank left stale by a rank table change is corrected first.
    pub async fn resync(&self, member_id: &MemberId) -> Result<ReconcileReport> {
        let rank = {
            let _guard = self.core.locks.acquire(member_id).await;

            let mut record = self
                .core
                .store
                .get(member_id)
                .await?
                .ok_or_else(|| Error::not_found(member_id))?;
            if let Some(change) = record.realign(&self.core.ranks) {
                info!(
                    member_id = %member_id,
                    from = %change.from,
                    to = %change.to,
                    "Stored rank realigned with the rank table"
                );
                self.core.store.upsert(record.clone()).await?;
            }
            record.rank
        };

        self.core.reconciler.reconcile_to(member_id, &rank).await
    }
}

// ─────────────────────────────────────────────────────────────────
// Test Harness
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod harness {
    use super::*;
    use crate::notify::ChannelNotifier;
    use crate::ranks::tests::{sample_schools, sample_table};
    use crate::roles::InMemoryRoleDirectory;
    use crate::store::MemoryStore;

    pub(crate) struct Harness {
        pub progression: Arc<Progression>,
        pub store: Arc<MemoryStore>,
        pub roles: Arc<InMemoryRoleDirectory>,
        pub events: tokio::sync::mpsc::Receiver<ProgressEvent>,
    }

    pub(crate) fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let roles = Arc::new(InMemoryRoleDirectory::new());
        let (notifier, events) = ChannelNotifier::new(64);
        let settings = ProgressionSettings {
            role_sync_attempts: 2,
            role_sync_backoff_ms: 1,
            ..Default::default()
        };

        let progression = Arc::new(Progression::new(
            store.clone(),
            Arc::new(sample_table()),
            Arc::new(sample_schools()),
            roles.clone(),
            Arc::new(notifier),
            settings,
        ));

        Harness {
            progression,
            store,
            roles,
            events,
        }
    }

    impl Harness {
        /// Seed a record with a given point total
        pub async fn seed(&self, member: &str, points: u64) -> MemberId {
            let member_id = MemberId::new(member);
            let table = sample_table();
            let mut record = ProgressionRecord::implicit(member_id.clone(), member, table.floor());
            record.add_points(points, &table);
            self.roles.assign(&member_id, table.role_for(&record.rank));
            self.store.upsert(record).await.unwrap();
            member_id
        }

        pub fn drain_events(&mut self) -> Vec<ProgressEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                events.push(event);
            }
            events
        }
    }
}

#[cfg(test)]
mod tests {
    use super::harness::{self, harness};
    use super::*;

    #[tokio::test]
    async fn test_profile_reports_next_rank() {
        let h = harness();
        let member = h.seed("a", 45).await;

        let profile = h.progression.profile(&member).await.unwrap();
        assert_eq!(profile.record.rank, "Wretch");
        assert_eq!(profile.next_rank.as_deref(), Some("Ember"));
        assert_eq!(profile.points_to_next, Some(5));
    }

    #[tokio::test]
    async fn test_profile_of_unknown_member() {
        let h = harness();
        let err = h.progression.profile(&MemberId::new("ghost")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_resync_repairs_drifted_roles() {
        let h = harness();
        let member = h.seed("a", 60).await;
        h.roles.assign(&member, [RoleId(100), RoleId(102)]);

        let report = h.progression.resync(&member).await.unwrap();
        assert_eq!(report.target_rank, "Ember");
        assert_eq!(report.removed, vec![RoleId(100), RoleId(102)]);
        assert_eq!(h.roles.roles_of(&member).into_iter().collect::<Vec<_>>(), vec![RoleId(101)]);

        let again = h.progression.resync(&member).await.unwrap();
        assert!(again.is_noop());
    }

    /// 60 points stored as Wretch, as written under a ladder with Ember at 100
    async fn seed_stale(h: &harness::Harness, member: &str) -> MemberId {
        let member_id = MemberId::new(member);
        let mut record =
            ProgressionRecord::implicit(member_id.clone(), member, h.progression.ranks().floor());
        record.points = 60;
        h.roles.assign(&member_id, [RoleId(100)]);
        h.store.upsert(record).await.unwrap();
        member_id
    }

    #[tokio::test]
    async fn test_reads_rederive_stale_rank() {
        let h = harness();
        let member = seed_stale(&h, "a").await;

        let profile = h.progression.profile(&member).await.unwrap();
        assert_eq!(profile.record.rank, "Ember");
        assert_eq!(profile.next_rank.as_deref(), Some("Seeker"));

        let board = h.progression.leaderboard().top(1).await.unwrap();
        assert_eq!(board[0].rank, "Ember");
    }

    #[tokio::test]
    async fn test_resync_realigns_stale_rank() {
        let h = harness();
        let member = seed_stale(&h, "a").await;

        let report = h.progression.resync(&member).await.unwrap();
        assert_eq!(report.target_rank, "Ember");
        assert_eq!(report.removed, vec![RoleId(100)]);
        assert_eq!(report.added, Some(RoleId(101)));
        assert_eq!(h.store.get(&member).await.unwrap().unwrap().rank, "Ember");
    }

    #[tokio::test]
    async fn test_points_on_stale_rank_swap_roles() {
        let mut h = harness();
        let member = seed_stale(&h, "a").await;

        let update = h.progression.points().add_points(&member, 5).await.unwrap();
        assert_eq!(update.rank, "Ember");
        assert_eq!(
            update.role_sync,
            RoleSync::Applied {
                removed: vec![RoleId(100)],
                added: Some(RoleId(101)),
            }
        );
        assert_eq!(h.drain_events().len(), 1);
    }
}
