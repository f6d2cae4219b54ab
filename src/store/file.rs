//! JSON document store
//!
//! Keeps every record in memory and rewrites the whole document on each
//! upsert. The document is written to a sibling temp file and renamed into
//! place so a crash never leaves a half-written store behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{MemberId, ProgressionRecord};

use super::{top_n, ProgressionStore};

const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    members: Vec<ProgressionRecord>,
}

/// File-backed progression store
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<BTreeMap<MemberId, ProgressionRecord>>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            let document: StoreDocument =
                serde_json::from_str(&content).map_err(|e| Error::StorageCorrupt {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            if document.version != DOCUMENT_VERSION {
                return Err(Error::StorageCorrupt {
                    path,
                    message: format!("unsupported document version {}", document.version),
                });
            }
            document
                .members
                .into_iter()
                .map(|record| (record.member_id.clone(), record))
                .collect()
        } else {
            debug!(path = %path.display(), "Store file missing, starting empty");
            BTreeMap::new()
        };

        info!(path = %path.display(), members = records.len(), "Progression store opened");

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &BTreeMap<MemberId, ProgressionRecord>) -> Result<()> {
        let document = StoreDocument {
            version: DOCUMENT_VERSION,
            members: records.values().cloned().collect(),
        };
        let content = serde_json::to_vec_pretty(&document)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await.map_err(|e| Error::IoWrite {
            path: temp_path.clone(),
            source: e,
        })?;
        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| Error::IoWrite {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }
}

#[async_trait]
impl ProgressionStore for JsonFileStore {
    fn name(&self) -> &'static str {
        "json-file"
    }

    async fn get(&self, member_id: &MemberId) -> Result<Option<ProgressionRecord>> {
        Ok(self.records.lock().await.get(member_id).cloned())
    }

    async fn upsert(&self, record: ProgressionRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        let member_id = record.member_id.clone();
        let previous = records.insert(member_id.clone(), record);

        // Keep memory and disk in agreement when the write fails.
        if let Err(e) = self.persist(&records).await {
            match previous {
                Some(previous) => records.insert(member_id, previous),
                None => records.remove(&member_id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn top_by_points(&self, n: usize) -> Result<Vec<ProgressionRecord>> {
        let all: Vec<_> = self.records.lock().await.values().cloned().collect();
        Ok(top_n(all, n))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.lock().await.len())
    }
}
