//! Role management boundary and rank-driven role reconciliation

mod memory;
mod reconciler;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{MemberId, RoleId};

pub use memory::{InMemoryRoleDirectory, RoleCall, RoleFaults};
pub use reconciler::{ReconcileReport, RetryPolicy, RolePlan, RoleReconciler};

// ─────────────────────────────────────────────────────────────────
// RoleDirectory Trait
// ─────────────────────────────────────────────────────────────────

/// External role-management collaborator.
///
/// Implementations report failures as `Error::Collaborator`, marking
/// transient ones (rate limits, timeouts) as retryable.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Collaborator name for logs
    fn name(&self) -> &'static str;

    /// Give a role to a member
    async fn grant_role(&self, member_id: &MemberId, role: RoleId) -> Result<()>;

    /// Take a role away from a member
    async fn revoke_role(&self, member_id: &MemberId, role: RoleId) -> Result<()>;

    /// Roles the member currently holds
    async fn list_roles(&self, member_id: &MemberId) -> Result<BTreeSet<RoleId>>;
}
