//! Rank role reconciliation
//!
//! Every run recomputes the plan from the member's current roles, so a run
//! that failed halfway (or was cancelled) is fixed by simply running again.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ranks::RankTable;
use crate::types::{MemberId, RoleId};

use super::RoleDirectory;

// ─────────────────────────────────────────────────────────────────
// Retry Policy
// ─────────────────────────────────────────────────────────────────

/// How often a retryable role call is attempted
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Run `op`, retrying retryable failures with exponential backoff
async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    call: &'static str,
    member_id: &MemberId,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = ExponentialBackoff {
        initial_interval: policy.initial_delay,
        max_interval: policy.max_delay,
        max_elapsed_time: None,
        ..Default::default()
    };
    backoff.reset();

    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = backoff.next_backoff().unwrap_or(policy.max_delay);
                warn!(
                    member_id = %member_id,
                    call,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Role call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Role Plan
// ─────────────────────────────────────────────────────────────────

/// Minimal set of changes that leaves exactly one tier role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RolePlan {
    /// Tier roles held that are not the target, in tier order
    pub remove: Vec<RoleId>,

    /// Target role, unless already held
    pub add: Option<RoleId>,
}

impl RolePlan {
    pub fn compute(table: &RankTable, held: &BTreeSet<RoleId>, target: RoleId) -> Self {
        let remove = table
            .all_roles()
            .into_iter()
            .filter(|role| *role != target && held.contains(role))
            .collect();
        let add = (!held.contains(&target)).then_some(target);
        Self { remove, add }
    }

    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_none()
    }
}

/// What a reconciliation run changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub member_id: MemberId,
    pub target_rank: String,
    pub removed: Vec<RoleId>,
    pub added: Option<RoleId>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.added.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────
// Role Reconciler
// ─────────────────────────────────────────────────────────────────

pub struct RoleReconciler {
    ranks: Arc<RankTable>,
    directory: Arc<dyn RoleDirectory>,
    retry: RetryPolicy,
}

impl RoleReconciler {
    pub fn new(ranks: Arc<RankTable>, directory: Arc<dyn RoleDirectory>, retry: RetryPolicy) -> Self {
        Self {
            ranks,
            directory,
            retry,
        }
    }

    /// Reconcile after a rank transition
    pub async fn reconcile(
        &self,
        member_id: &MemberId,
        old_rank: &str,
        new_rank: &str,
    ) -> Result<ReconcileReport> {
        debug!(member_id = %member_id, from = old_rank, to = new_rank, "Reconciling rank roles");
        self.reconcile_to(member_id, new_rank).await
    }

    /// Make the member hold exactly the tier role of `rank`
    pub async fn reconcile_to(&self, member_id: &MemberId, rank: &str) -> Result<ReconcileReport> {
        let target = self
            .ranks
            .role_for(rank)
            .ok_or_else(|| Error::UnknownRank {
                name: rank.to_string(),
            })?;

        let held = with_retry(&self.retry, "list_roles", member_id, move || {
            self.directory.list_roles(member_id)
        })
        .await?;

        let plan = RolePlan::compute(&self.ranks, &held, target);
        if plan.is_empty() {
            debug!(member_id = %member_id, rank, "Rank roles already in sync");
            return Ok(ReconcileReport {
                member_id: member_id.clone(),
                target_rank: rank.to_string(),
                removed: Vec::new(),
                added: None,
            });
        }

        // Removals first so exclusive-tier platforms never see two tier roles.
        for role in &plan.remove {
            with_retry(&self.retry, "revoke_role", member_id, move || {
                self.directory.revoke_role(member_id, *role)
            })
            .await?;
        }
        if let Some(role) = plan.add {
            self.grant(member_id, role).await?;
        }

        info!(
            member_id = %member_id,
            rank,
            removed = ?plan.remove,
            added = ?plan.add,
            "Rank roles reconciled"
        );

        Ok(ReconcileReport {
            member_id: member_id.clone(),
            target_rank: rank.to_string(),
            removed: plan.remove,
            added: plan.add,
        })
    }

    /// Grant a single role under the retry policy
    pub async fn grant(&self, member_id: &MemberId, role: RoleId) -> Result<()> {
        with_retry(&self.retry, "grant_role", member_id, move || {
            self.directory.grant_role(member_id, role)
        })
        .await
    }
}
