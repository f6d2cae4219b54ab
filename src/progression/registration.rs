//! One-time registration

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConflictReason, Error, Result};
use crate::notify::{self, ProgressEvent};
use crate::types::{MemberId, ProgressionRecord, RegistrationProfile, RoleId};

use super::Core;

/// Registration request as received from the command boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub member_id: MemberId,
    pub display_name: String,
    pub school: String,
    pub gender: String,
    pub age: u32,
}

/// A stored registration and the roles granted for it
#[derive(Debug, Clone, Serialize)]
pub struct Registered {
    pub record: ProgressionRecord,
    pub granted: Vec<RoleId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub struct RegistrationService {
    core: Arc<Core>,
}

impl RegistrationService {
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self { core }
    }

    /// Create the member's record and grant the school and rank roles.
    ///
    /// Nothing is stored when validation fails or a record already exists.
    pub async fn register(&self, request: Registration) -> Result<Registered> {
        let display_name = request.display_name.trim();
        if display_name.is_empty() {
            return Err(Error::invalid_input("display_name", "must not be empty"));
        }
        let gender = request.gender.trim();
        if gender.is_empty() {
            return Err(Error::invalid_input("gender", "must not be empty"));
        }
        if request.age == 0 {
            return Err(Error::invalid_input("age", "must be greater than zero"));
        }
        let school = self.core.schools.find(&request.school).ok_or_else(|| {
            Error::invalid_input("school", format!("unknown school '{}'", request.school.trim()))
        })?;

        let member_id = &request.member_id;

        let record = {
            let _guard = self.core.locks.acquire(member_id).await;

            if self.core.store.get(member_id).await?.is_some() {
                return Err(Error::conflict(member_id, ConflictReason::AlreadyRegistered));
            }

            let profile = RegistrationProfile {
                school: school.name.clone(),
                gender: gender.to_string(),
                age: request.age,
            };
            let record = ProgressionRecord::registered(
                member_id.clone(),
                display_name,
                profile,
                self.core.ranks.floor(),
            );
            self.core.store.upsert(record.clone()).await?;
            record
        };

        info!(
            member_id = %member_id,
            school = %school.name,
            rank = %record.rank,
            "Member registered"
        );

        let mut granted = Vec::new();
        let mut warnings = Vec::new();
        match self.core.reconciler.grant(member_id, school.role_id).await {
            Ok(()) => granted.push(school.role_id),
            Err(e) => {
                warn!(member_id = %member_id, role = %school.role_id, error = %e, "Failed to grant school role");
                warnings.push(e.to_string());
            }
        }

        // Points may have landed since the lock was released.
        let rank = self.core.current_rank(member_id, &record.rank).await;
        match self.core.reconciler.reconcile_to(member_id, &rank).await {
            Ok(report) => granted.extend(report.added),
            Err(e) => {
                warn!(member_id = %member_id, rank = %rank, error = %e, "Failed to assign rank role");
                warnings.push(e.to_string());
            }
        }

        if let Some(event) = ProgressEvent::registration(&record) {
            if let Some(warning) = notify::publish_or_warn(self.core.notifier.as_ref(), event).await {
                warnings.push(warning);
            }
        }

        Ok(Registered {
            record,
            granted,
            warnings,
        })
    }
}
