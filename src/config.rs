//! Configuration for rebels-progress
//!
//! Sources, highest precedence first:
//! 1. CLI arguments
//! 2. Environment variables (REBELS_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::ranks::{RankTable, RankTier, School, SchoolDirectory};
use crate::roles::RetryPolicy;
use crate::types::RoleId;

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Rewards, leaderboard size and role sync retries
    pub progression: ProgressionSettings,

    /// Rank tiers in ascending threshold order
    pub ranks: Vec<RankTier>,

    /// Schools offered at registration
    pub schools: Vec<School>,

    /// Record persistence
    pub storage: StorageSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Progression tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionSettings {
    /// Points paid for a completed study session
    pub study_reward: u64,

    /// Rows shown when a leaderboard is requested without a size
    pub leaderboard_size: usize,

    /// Attempts per role call, including the first
    pub role_sync_attempts: u32,

    /// Delay before the first role call retry, in milliseconds
    pub role_sync_backoff_ms: u64,
}

/// Storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON document holding every record (unset = in-memory only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (unset = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            progression: ProgressionSettings::default(),
            ranks: default_ranks(),
            schools: default_schools(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for ProgressionSettings {
    fn default() -> Self {
        Self {
            study_reward: 10,
            leaderboard_size: 10,
            role_sync_attempts: 3,
            role_sync_backoff_ms: 200,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

/// The community's rank ladder
pub fn default_ranks() -> Vec<RankTier> {
    [
        ("Wretch", 0, 1355387300166766702),
        ("Ember", 50, 1355654614019477695),
        ("Seeker", 150, 1355654906723307601),
        ("Adept", 400, 1355655113946955899),
        ("Harbinger", 1000, 1355655268058402856),
        ("Sentinel", 2000, 1355655434194911303),
        ("Dominion", 4000, 1355655562947461320),
        ("Sovereign", 8000, 1355655788944949520),
        ("Ace", 500000, 1354566441101168640),
    ]
    .into_iter()
    .map(|(name, threshold, role)| RankTier::new(name, threshold, RoleId(role)))
    .collect()
}

/// Schools with placeholder role ids; real ids come from the file or
/// `REBELS_<SCHOOL>_ROLE_ID`
pub fn default_schools() -> Vec<School> {
    [("Grimward", 1), ("Ravenshire", 2), ("Grahanta", 3)]
        .into_iter()
        .map(|(name, role)| School::new(name, RoleId(role)))
        .collect()
}

impl ProgressionSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.role_sync_attempts.max(1),
            initial_delay: Duration::from_millis(self.role_sync_backoff_ms),
            ..Default::default()
        }
    }
}

impl ServiceConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = Self::from_toml(&content)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides(|key| std::env::var(key).ok());

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document without validating it
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            message: e.message().to_string(),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        let search_paths = [
            PathBuf::from("rebels-progress.toml"),
            dirs::config_dir()
                .map(|p| p.join("rebels").join("progress.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".rebels").join("progress.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/rebels/progress.toml"),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply `REBELS_*` overrides read through `var`
    fn apply_env_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |val: String| val.to_lowercase() == "true" || val == "1";

        // Progression settings
        if let Some(n) = var("REBELS_STUDY_REWARD").and_then(|v| v.parse().ok()) {
            self.progression.study_reward = n;
        }
        if let Some(n) = var("REBELS_LEADERBOARD_SIZE").and_then(|v| v.parse().ok()) {
            self.progression.leaderboard_size = n;
        }
        if let Some(n) = var("REBELS_ROLE_SYNC_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.progression.role_sync_attempts = n;
        }

        // School roles, e.g. REBELS_GRIMWARD_ROLE_ID
        for school in &mut self.schools {
            let key = format!("REBELS_{}_ROLE_ID", school.name.to_uppercase().replace(' ', "_"));
            if let Some(id) = var(&key).and_then(|v| v.parse().ok()) {
                school.role_id = RoleId(id);
            }
        }

        // Storage settings
        if let Some(val) = var("REBELS_STORE_PATH") {
            self.storage.path = Some(val);
        }

        // Logging settings
        if let Some(val) = var("REBELS_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = var("REBELS_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Some(val) = var("REBELS_LOG_JSON") {
            self.logging.json_format = flag(val);
        }
    }

    /// Expand ~ and environment variables in paths
    fn expand_paths(&mut self) {
        if let Some(ref path) = self.storage.path {
            self.storage.path = Some(expand_path(path));
        }
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.progression.study_reward == 0 {
            return Err(Error::config_field_invalid(
                "progression.study_reward",
                "study_reward must be greater than 0",
            ));
        }
        if self.progression.leaderboard_size == 0 {
            return Err(Error::config_field_invalid(
                "progression.leaderboard_size",
                "leaderboard_size must be greater than 0",
            ));
        }

        let ranks = self.rank_table()?;
        self.school_directory()?;

        let rank_roles: HashSet<RoleId> = ranks.all_roles().into_iter().collect();
        if let Some(school) = self.schools.iter().find(|s| rank_roles.contains(&s.role_id)) {
            return Err(Error::config_field_invalid(
                "schools",
                format!("school '{}' reuses rank role {}", school.name, school.role_id),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Build the validated rank table
    pub fn rank_table(&self) -> Result<RankTable> {
        RankTable::new(self.ranks.clone())
    }

    /// Build the validated school directory
    pub fn school_directory(&self) -> Result<SchoolDirectory> {
        SchoolDirectory::new(self.schools.clone())
    }

    /// Store file, if persistence is configured
    pub fn store_path(&self) -> Option<PathBuf> {
        self.storage.path.as_ref().map(PathBuf::from)
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Write a commented default configuration file, returning its path
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".rebels")
                .join("progress.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::ConfigValidation {
            message: format!(
                "Configuration file already exists: {}. Use --force to overwrite.",
                config_path.display()
            ),
            field: None,
        });
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Default configuration content with comments
pub fn generate_default_config() -> String {
    let mut out = String::from(
        r#"# rebels-progress configuration

[progression]
# Points paid for a completed study session
study_reward = 10

# Rows shown by the leaderboard when no size is given
leaderboard_size = 10

# Attempts per role call (including the first) and the first retry delay
role_sync_attempts = 3
role_sync_backoff_ms = 200

[storage]
# JSON document holding every member record (comment out to keep records in memory)
# path = "~/.rebels/progress.json"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.rebels/logs/progress.log"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false

# Rank tiers: thresholds start at 0 and strictly increase.
"#,
    );

    for tier in default_ranks() {
        out.push_str(&format!(
            "\n[[ranks]]\nname = \"{}\"\nthreshold = {}\nrole_id = {}\n",
            tier.name, tier.threshold, tier.role_id
        ));
    }

    out.push_str("\n# Schools offered at registration. Replace the role ids with your server's.\n");
    for school in default_schools() {
        out.push_str(&format!(
            "\n[[schools]]\nname = \"{}\"\nrole_id = {}\n",
            school.name, school.role_id
        ));
    }

    out
}
