//! Opaque identifiers owned by the external platform

use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Member ID
// ─────────────────────────────────────────────────────────────────

/// Platform identity of a member. Never generated locally.
///
/// Ordering is lexical and is the leaderboard tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u64> for MemberId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────
// Role ID
// ─────────────────────────────────────────────────────────────────

/// Stable identifier of an externally managed role
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub u64);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_id_ordering_is_lexical() {
        let mut ids = vec![MemberId::new("b"), MemberId::new("c"), MemberId::new("a")];
        ids.sort();
        assert_eq!(ids, vec![MemberId::new("a"), MemberId::new("b"), MemberId::new("c")]);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&MemberId::from(1234u64)).unwrap(), "\"1234\"");
        assert_eq!(serde_json::to_string(&RoleId(99)).unwrap(), "99");
    }
}
