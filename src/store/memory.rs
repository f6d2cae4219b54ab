//! In-process progression store

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::types::{MemberId, ProgressionRecord};

use super::{top_n, ProgressionStore};

/// Thread-safe map of records, lost on exit
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<MemberId, ProgressionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing records
    pub fn with_records(records: impl IntoIterator<Item = ProgressionRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.member_id.clone(), record))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl ProgressionStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, member_id: &MemberId) -> Result<Option<ProgressionRecord>> {
        Ok(self.records.read().get(member_id).cloned())
    }

    async fn upsert(&self, record: ProgressionRecord) -> Result<()> {
        self.records.write().insert(record.member_id.clone(), record);
        Ok(())
    }

    async fn top_by_points(&self, n: usize) -> Result<Vec<ProgressionRecord>> {
        let all: Vec<_> = self.records.read().values().cloned().collect();
        Ok(top_n(all, n))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranks::tests::sample_table;

    fn record(id: &str, points: u64) -> ProgressionRecord {
        let table = sample_table();
        let mut record = ProgressionRecord::implicit(MemberId::new(id), id, table.floor());
        record.add_points(points, &table);
        record
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let store = MemoryStore::new();
        assert!(store.get(&MemberId::new("a")).await.unwrap().is_none());

        store.upsert(record("a", 30)).await.unwrap();
        let fetched = store.get(&MemberId::new("a")).await.unwrap().unwrap();
        assert_eq!(fetched.points, 30);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = MemoryStore::new();
        store.upsert(record("a", 30)).await.unwrap();
        store.upsert(record("a", 60)).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get(&MemberId::new("a")).await.unwrap().unwrap().rank, "Ember");
    }

    #[tokio::test]
    async fn test_top_by_points_breaks_ties_by_member_id() {
        let store = MemoryStore::with_records([record("b", 30), record("a", 30), record("c", 10)]);

        let top = store.top_by_points(3).await.unwrap();
        let ids: Vec<_> = top.iter().map(|r| r.member_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        assert_eq!(store.top_by_points(1).await.unwrap().len(), 1);
        assert!(store.top_by_points(0).await.unwrap().is_empty());
    }

    #[test]
    fn test_get_or_create_reports_variant() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let first = store.get_or_create(record("a", 0)).await.unwrap();
            assert!(first.was_created());

            let second = store.get_or_create(record("a", 0)).await.unwrap();
            assert!(!second.was_created());
            assert_eq!(second.record().member_id, MemberId::new("a"));
        });
    }
}
