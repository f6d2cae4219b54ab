//! In-process role directory
//!
//! Used by the `serve` command when no platform is attached, and by tests,
//! which inspect call counts and inject failures.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::types::{MemberId, RoleId};

use super::RoleDirectory;

// ─────────────────────────────────────────────────────────────────
// Failure Injection
// ─────────────────────────────────────────────────────────────────

/// Failures the directory should simulate
#[derive(Debug, Clone, Default)]
pub struct RoleFaults {
    /// Every grant fails permanently
    pub fail_grant: bool,

    /// Every revoke fails permanently
    pub fail_revoke: bool,

    /// Every listing fails permanently
    pub fail_list: bool,

    /// The next N calls of any kind fail with a retryable error
    pub transient_failures: u32,

    /// Roles that do not exist on the platform
    pub missing_roles: BTreeSet<RoleId>,
}

/// A mutating call as seen by the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleCall {
    Grant(MemberId, RoleId),
    Revoke(MemberId, RoleId),
}

#[derive(Debug, Default)]
struct CallCounts {
    grant: u32,
    revoke: u32,
    list: u32,
}

// ─────────────────────────────────────────────────────────────────
// In-Memory Directory
// ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryRoleDirectory {
    members: RwLock<HashMap<MemberId, BTreeSet<RoleId>>>,
    faults: RwLock<RoleFaults>,
    counts: RwLock<CallCounts>,
    log: RwLock<Vec<RoleCall>>,
}

impl InMemoryRoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: RoleFaults) -> Self {
        let directory = Self::default();
        directory.set_faults(faults);
        directory
    }

    pub fn set_faults(&self, faults: RoleFaults) {
        *self.faults.write() = faults;
    }

    /// Seed a member's roles without counting calls
    pub fn assign(&self, member_id: &MemberId, roles: impl IntoIterator<Item = RoleId>) {
        self.members
            .write()
            .entry(member_id.clone())
            .or_default()
            .extend(roles);
    }

    pub fn roles_of(&self, member_id: &MemberId) -> BTreeSet<RoleId> {
        self.members
            .read()
            .get(member_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn grant_count(&self) -> u32 {
        self.counts.read().grant
    }

    pub fn revoke_count(&self) -> u32 {
        self.counts.read().revoke
    }

    pub fn list_count(&self) -> u32 {
        self.counts.read().list
    }

    /// Grant and revoke calls in the order they arrived
    pub fn mutation_log(&self) -> Vec<RoleCall> {
        self.log.read().clone()
    }

    pub fn reset_counts(&self) {
        *self.counts.write() = CallCounts::default();
        self.log.write().clear();
    }

    /// Consume one transient failure if any are pending
    fn take_transient(&self) -> Result<()> {
        let mut faults = self.faults.write();
        if faults.transient_failures > 0 {
            faults.transient_failures -= 1;
            return Err(Error::roles("rate limited by platform", true));
        }
        Ok(())
    }
}

#[async_trait]
impl RoleDirectory for InMemoryRoleDirectory {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn grant_role(&self, member_id: &MemberId, role: RoleId) -> Result<()> {
        self.counts.write().grant += 1;
        self.log.write().push(RoleCall::Grant(member_id.clone(), role));
        self.take_transient()?;

        {
            let faults = self.faults.read();
            if faults.missing_roles.contains(&role) {
                return Err(Error::roles(format!("role {} not found", role), false));
            }
            if faults.fail_grant {
                return Err(Error::roles("missing permission to manage roles", false));
            }
        }

        self.members
            .write()
            .entry(member_id.clone())
            .or_default()
            .insert(role);
        Ok(())
    }

    async fn revoke_role(&self, member_id: &MemberId, role: RoleId) -> Result<()> {
        self.counts.write().revoke += 1;
        self.log.write().push(RoleCall::Revoke(member_id.clone(), role));
        self.take_transient()?;

        if self.faults.read().fail_revoke {
            return Err(Error::roles("missing permission to manage roles", false));
        }

        if let Some(roles) = self.members.write().get_mut(member_id) {
            roles.remove(&role);
        }
        Ok(())
    }

    async fn list_roles(&self, member_id: &MemberId) -> Result<BTreeSet<RoleId>> {
        self.counts.write().list += 1;
        self.take_transient()?;

        if self.faults.read().fail_list {
            return Err(Error::roles("member lookup failed", false));
        }
        Ok(self.roles_of(member_id))
    }
}
