//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use rebels_progress::config::ServiceConfig;
use rebels_progress::notify::{ChannelNotifier, ProgressEvent};
use rebels_progress::roles::InMemoryRoleDirectory;
use rebels_progress::Progression;
use tokio::sync::mpsc;

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// Three ranks (Wretch 0 / Ember 50 / Seeker 150, roles 100-102) and two schools
pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

/// Rank thresholds out of order
pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

pub fn fixture_config() -> ServiceConfig {
    let content = std::fs::read_to_string(valid_config_fixture()).unwrap();
    let config = ServiceConfig::from_toml(&content).unwrap();
    config.validate().unwrap();
    config
}

/// Engine over the fixture config with in-memory collaborators
pub struct Engine {
    pub progression: Arc<Progression>,
    pub roles: Arc<InMemoryRoleDirectory>,
    pub events: mpsc::Receiver<ProgressEvent>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(fixture_config())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let roles = Arc::new(InMemoryRoleDirectory::new());
        let (notifier, events) = ChannelNotifier::new(256);
        let progression =
            Progression::from_config(&config, roles.clone(), Arc::new(notifier)).unwrap();
        Self {
            progression: Arc::new(progression),
            roles,
            events,
        }
    }

    pub fn drain_events(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
