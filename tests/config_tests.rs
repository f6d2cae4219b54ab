//! Configuration loading and validation tests

mod common;

use std::fs;
use std::path::PathBuf;

use rebels_progress::config::{generate_default_config, init_config, ServiceConfig};
use rebels_progress::error::{Error, ErrorCode};
use tempfile::TempDir;

use common::{invalid_config_fixture, valid_config_fixture};

/// Temporary directory holding one config file
struct ConfigFixture {
    _temp_dir: TempDir,
    config_path: PathBuf,
}

impl ConfigFixture {
    fn new(content: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("progress.toml");
        fs::write(&config_path, content).unwrap();
        Self {
            _temp_dir: temp_dir,
            config_path,
        }
    }

    fn path(&self) -> &str {
        self.config_path.to_str().unwrap()
    }
}

const LADDER: &str = r#"
[[ranks]]
name = "Wretch"
threshold = 0
role_id = 100

[[ranks]]
name = "Ember"
threshold = 50
role_id = 101
"#;

#[test]
fn test_load_fixture() {
    let config = ServiceConfig::load(valid_config_fixture().to_str()).unwrap();
    assert_eq!(config.progression.study_reward, 10);
    assert_eq!(config.progression.leaderboard_size, 5);
    assert_eq!(config.ranks.len(), 3);
    assert_eq!(config.schools.len(), 2);

    let table = config.rank_table().unwrap();
    assert_eq!(table.floor().name, "Wretch");
    assert_eq!(table.rank_for(149).name, "Ember");
}

#[test]
fn test_load_rejects_unordered_ranks() {
    let err = ServiceConfig::load(invalid_config_fixture().to_str()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConfigValidation);
}

#[test]
fn test_missing_explicit_file() {
    let err = ServiceConfig::load(Some("/nonexistent/progress.toml")).unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound { .. }));
    assert_eq!(err.exit_code(), 10);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let fixture = ConfigFixture::new(
        r#"
[progression]
study_reward = 25
"#,
    );
    let config = ServiceConfig::load(Some(fixture.path())).unwrap();
    assert_eq!(config.progression.study_reward, 25);
    assert_eq!(config.progression.leaderboard_size, 10);
    assert_eq!(config.ranks.len(), 9);
    assert_eq!(config.schools.len(), 3);
}

#[test]
fn test_malformed_toml() {
    let err = ServiceConfig::from_toml("[progression\nstudy_reward = ").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConfigParseError);
}

#[test]
fn test_zero_reward_rejected() {
    let fixture = ConfigFixture::new(&format!("[progression]\nstudy_reward = 0\n{}", LADDER));
    let err = ServiceConfig::load(Some(fixture.path())).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConfigValidation);
}

#[test]
fn test_ladder_must_start_at_zero() {
    let config = ServiceConfig::from_toml(
        r#"
[[ranks]]
name = "Ember"
threshold = 50
role_id = 101
"#,
    )
    .unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_school_reusing_rank_role_rejected() {
    let config = ServiceConfig::from_toml(&format!(
        "{}\n[[schools]]\nname = \"Grimward\"\nrole_id = 101\n",
        LADDER
    ))
    .unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("Grimward"));
}

#[test]
fn test_invalid_log_level_rejected() {
    let config =
        ServiceConfig::from_toml(&format!("[logging]\nlevel = \"loud\"\n{}", LADDER)).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_generated_default_config_is_valid() {
    let config = ServiceConfig::from_toml(&generate_default_config()).unwrap();
    config.validate().unwrap();

    let defaults = ServiceConfig::default();
    assert_eq!(config.ranks, defaults.ranks);
    assert_eq!(config.progression.study_reward, defaults.progression.study_reward);
    assert!(config.storage.path.is_none());
}

#[test]
fn test_init_config_respects_force() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("progress.toml");
    let path_str = path.to_str().unwrap();

    let written = init_config(Some(path_str), false).unwrap();
    assert_eq!(written, path);
    assert!(path.exists());

    assert!(init_config(Some(path_str), false).is_err());
    assert!(init_config(Some(path_str), true).is_ok());
}
