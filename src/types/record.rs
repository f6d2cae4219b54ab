//! Persisted per-member progression state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ranks::{RankTable, RankTier};

use super::MemberId;

// ─────────────────────────────────────────────────────────────────
// Study State
// ─────────────────────────────────────────────────────────────────

/// Study session state of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyState {
    Idle,
    Active,
}

impl Default for StudyState {
    fn default() -> Self {
        StudyState::Idle
    }
}

// ─────────────────────────────────────────────────────────────────
// Registration Profile
// ─────────────────────────────────────────────────────────────────

/// Attributes captured once by explicit registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationProfile {
    pub school: String,
    pub gender: String,
    pub age: u32,
}

// ─────────────────────────────────────────────────────────────────
// Rank Change
// ─────────────────────────────────────────────────────────────────

/// A rank transition caused by a point increase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankChange {
    pub from: String,
    pub to: String,
}

// ─────────────────────────────────────────────────────────────────
// Progression Record
// ─────────────────────────────────────────────────────────────────

/// One member's progression state.
///
/// `rank` is the name of `RankTable::rank_for(points)` under the table that
/// last wrote it. Readers re-derive it with [`ProgressionRecord::realign`]
/// so a changed table never surfaces a stale rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionRecord {
    pub member_id: MemberId,
    pub display_name: String,
    pub points: u64,
    pub rank: String,
    #[serde(default)]
    pub study_session_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressionRecord {
    /// Record created implicitly by a first study session
    pub fn implicit(member_id: MemberId, display_name: impl Into<String>, floor: &RankTier) -> Self {
        let now = Utc::now();
        Self {
            member_id,
            display_name: display_name.into(),
            points: 0,
            rank: floor.name.clone(),
            study_session_active: false,
            school: None,
            gender: None,
            age: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record created by explicit registration
    pub fn registered(
        member_id: MemberId,
        display_name: impl Into<String>,
        profile: RegistrationProfile,
        floor: &RankTier,
    ) -> Self {
        Self {
            school: Some(profile.school),
            gender: Some(profile.gender),
            age: Some(profile.age),
            ..Self::implicit(member_id, display_name, floor)
        }
    }

    pub fn study_state(&self) -> StudyState {
        if self.study_session_active {
            StudyState::Active
        } else {
            StudyState::Idle
        }
    }

    pub fn set_study_state(&mut self, state: StudyState) {
        self.study_session_active = state == StudyState::Active;
        self.updated_at = Utc::now();
    }

    /// Add points and recompute the rank.
    ///
    /// Returns the transition when the derived rank changed.
    pub fn add_points(&mut self, delta: u64, table: &RankTable) -> Option<RankChange> {
        self.points = self.points.saturating_add(delta);
        self.updated_at = Utc::now();
        self.realign(table)
    }

    /// Re-derive `rank` from `points` under `table`.
    ///
    /// A stored rank goes stale when the table changes between runs; the
    /// returned transition is the correction.
    pub fn realign(&mut self, table: &RankTable) -> Option<RankChange> {
        let rank = &table.rank_for(self.points).name;
        if *rank == self.rank {
            return None;
        }

        self.updated_at = Utc::now();
        Some(RankChange {
            from: std::mem::replace(&mut self.rank, rank.clone()),
            to: rank.clone(),
        })
    }

    /// Whether the record came from explicit registration
    pub fn is_registered(&self) -> bool {
        self.school.is_some()
    }
}
