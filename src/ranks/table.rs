//! Ordered rank tiers and pure lookups over them

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::RoleId;

// ─────────────────────────────────────────────────────────────────
// Rank Tier
// ─────────────────────────────────────────────────────────────────

/// A named progression level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankTier {
    /// Display name, unique within the table
    pub name: String,

    /// Minimum points needed to hold this rank
    pub threshold: u64,

    /// Role granted while the rank is held
    pub role_id: RoleId,
}

impl RankTier {
    pub fn new(name: impl Into<String>, threshold: u64, role_id: RoleId) -> Self {
        Self {
            name: name.into(),
            threshold,
            role_id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Rank Table
// ─────────────────────────────────────────────────────────────────

/// Validated, ordered tier list.
///
/// Invariants: at least one tier, first threshold is 0, thresholds strictly
/// increase, names and role ids are unique.
#[derive(Debug, Clone)]
pub struct RankTable {
    tiers: Vec<RankTier>,
}

impl RankTable {
    /// Build a table, rejecting any tier list that breaks the invariants
    pub fn new(tiers: Vec<RankTier>) -> Result<Self> {
        let first = tiers
            .first()
            .ok_or_else(|| Error::config_field_invalid("ranks", "at least one rank tier is required"))?;
        if first.threshold != 0 {
            return Err(Error::config_field_invalid(
                "ranks",
                format!("floor tier '{}' must have threshold 0, found {}", first.name, first.threshold),
            ));
        }

        for pair in tiers.windows(2) {
            if pair[1].threshold <= pair[0].threshold {
                return Err(Error::config_field_invalid(
                    "ranks",
                    format!(
                        "thresholds must strictly increase: '{}' ({}) follows '{}' ({})",
                        pair[1].name, pair[1].threshold, pair[0].name, pair[0].threshold
                    ),
                ));
            }
        }

        let mut names = HashSet::new();
        let mut roles = HashSet::new();
        for tier in &tiers {
            if tier.name.trim().is_empty() {
                return Err(Error::config_field_invalid("ranks", "rank names cannot be empty"));
            }
            if !names.insert(tier.name.as_str()) {
                return Err(Error::config_field_invalid(
                    "ranks",
                    format!("duplicate rank name '{}'", tier.name),
                ));
            }
            if !roles.insert(tier.role_id) {
                return Err(Error::config_field_invalid(
                    "ranks",
                    format!("role {} is assigned to more than one rank", tier.role_id),
                ));
            }
        }

        Ok(Self { tiers })
    }

    /// The default tier every member starts in
    pub fn floor(&self) -> &RankTier {
        &self.tiers[0]
    }

    /// Highest tier whose threshold is at most `points`
    pub fn rank_for(&self, points: u64) -> &RankTier {
        let above = self.tiers.partition_point(|tier| tier.threshold <= points);
        // Floor threshold is 0, so `above` is at least 1.
        &self.tiers[above - 1]
    }

    /// Tier by name
    pub fn tier(&self, name: &str) -> Option<&RankTier> {
        self.tiers.iter().find(|tier| tier.name == name)
    }

    /// Zero-based position of a tier, higher is better
    pub fn position(&self, name: &str) -> Option<usize> {
        self.tiers.iter().position(|tier| tier.name == name)
    }

    /// Role attached to a rank name
    pub fn role_for(&self, name: &str) -> Option<RoleId> {
        self.tier(name).map(|tier| tier.role_id)
    }

    /// Every tier role, in tier order
    pub fn all_roles(&self) -> Vec<RoleId> {
        self.tiers.iter().map(|tier| tier.role_id).collect()
    }

    /// Whether a role belongs to some tier
    pub fn is_tier_role(&self, role: RoleId) -> bool {
        self.tiers.iter().any(|tier| tier.role_id == role)
    }

    /// Next tier above the one held at `points`, with the points still missing
    pub fn next_tier(&self, points: u64) -> Option<(&RankTier, u64)> {
        self.tiers
            .iter()
            .find(|tier| tier.threshold > points)
            .map(|tier| (tier, tier.threshold - points))
    }

    pub fn tiers(&self) -> &[RankTier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranks::tests::sample_table;

    #[test]
    fn test_rank_for_boundaries() {
        let table = sample_table();
        assert_eq!(table.rank_for(0).name, "Wretch");
        assert_eq!(table.rank_for(49).name, "Wretch");
        assert_eq!(table.rank_for(50).name, "Ember");
        assert_eq!(table.rank_for(149).name, "Ember");
        assert_eq!(table.rank_for(150).name, "Seeker");
        assert_eq!(table.rank_for(u64::MAX).name, "Seeker");
    }

    #[test]
    fn test_rank_for_zero_is_floor() {
        let table = sample_table();
        assert_eq!(table.rank_for(0), table.floor());
    }

    #[test]
    fn test_rank_is_monotonic_in_points() {
        let table = sample_table();
        let mut previous = 0;
        for points in 0..400u64 {
            let position = table.position(&table.rank_for(points).name).unwrap();
            assert!(position >= previous, "rank dropped at {} points", points);
            previous = position;
        }
    }

    #[test]
    fn test_rank_for_is_deterministic() {
        let table = sample_table();
        for points in [0, 7, 50, 151, 9999] {
            assert_eq!(table.rank_for(points), table.rank_for(points));
        }
    }

    #[test]
    fn test_role_lookups() {
        let table = sample_table();
        assert_eq!(table.role_for("Ember"), Some(RoleId(101)));
        assert_eq!(table.role_for("Sovereign"), None);
        assert_eq!(table.all_roles(), vec![RoleId(100), RoleId(101), RoleId(102)]);
        assert!(table.is_tier_role(RoleId(102)));
        assert!(!table.is_tier_role(RoleId(7)));
    }

    #[test]
    fn test_next_tier() {
        let table = sample_table();
        let (tier, missing) = table.next_tier(45).unwrap();
        assert_eq!(tier.name, "Ember");
        assert_eq!(missing, 5);
        assert!(table.next_tier(150).is_none());
    }

    #[test]
    fn test_rejects_empty_table() {
        assert!(RankTable::new(vec![]).is_err());
    }

    #[test]
    fn test_rejects_nonzero_floor() {
        let result = RankTable::new(vec![RankTier::new("Ember", 50, RoleId(1))]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let result = RankTable::new(vec![
            RankTier::new("Wretch", 0, RoleId(1)),
            RankTier::new("Seeker", 150, RoleId(2)),
            RankTier::new("Ember", 150, RoleId(3)),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_duplicate_names_and_roles() {
        let duplicate_name = RankTable::new(vec![
            RankTier::new("Wretch", 0, RoleId(1)),
            RankTier::new("Wretch", 10, RoleId(2)),
        ]);
        assert!(duplicate_name.is_err());

        let duplicate_role = RankTable::new(vec![
            RankTier::new("Wretch", 0, RoleId(1)),
            RankTier::new("Ember", 10, RoleId(1)),
        ]);
        assert!(duplicate_role.is_err());
    }
}
