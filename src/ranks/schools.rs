//! Schools a member can register into, each with its own role

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::RoleId;

/// A school and the role its students receive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub name: String,
    pub role_id: RoleId,
}

impl School {
    pub fn new(name: impl Into<String>, role_id: RoleId) -> Self {
        Self {
            name: name.into(),
            role_id,
        }
    }
}

/// Validated list of schools
#[derive(Debug, Clone)]
pub struct SchoolDirectory {
    schools: Vec<School>,
}

impl SchoolDirectory {
    pub fn new(schools: Vec<School>) -> Result<Self> {
        if schools.is_empty() {
            return Err(Error::config_field_invalid("schools", "at least one school is required"));
        }

        let mut names = HashSet::new();
        for school in &schools {
            if school.name.trim().is_empty() {
                return Err(Error::config_field_invalid("schools", "school names cannot be empty"));
            }
            if !names.insert(school.name.to_lowercase()) {
                return Err(Error::config_field_invalid(
                    "schools",
                    format!("duplicate school '{}'", school.name),
                ));
            }
        }

        Ok(Self { schools })
    }

    /// Case-insensitive lookup
    pub fn find(&self, name: &str) -> Option<&School> {
        let name = name.trim();
        self.schools
            .iter()
            .find(|school| school.name.eq_ignore_ascii_case(name))
    }

    pub fn schools(&self) -> &[School] {
        &self.schools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranks::tests::sample_schools;

    #[test]
    fn test_find_ignores_case_and_whitespace() {
        let schools = sample_schools();
        let school = schools.find(" grimward ").unwrap();
        assert_eq!(school.name, "Grimward");
        assert_eq!(school.role_id, RoleId(200));
        assert!(schools.find("Grahanta").is_none());
    }

    #[test]
    fn test_rejects_duplicates() {
        let result = SchoolDirectory::new(vec![
            School::new("Grimward", RoleId(1)),
            School::new("GRIMWARD", RoleId(2)),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_empty() {
        assert!(SchoolDirectory::new(vec![]).is_err());
    }
}
