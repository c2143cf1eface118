use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::tables::Tables;
use super::{Store, StoreError, Upsert};
use crate::model::{Entry, EntryId, NewEntry, Source, SourceId};

/// A process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_source(&self, url: &str, owner: Option<u64>) -> Result<Source, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.insert_source(url, owner, Utc::now()))
    }

    async fn list_auto_update(&self) -> Result<Vec<Source>, StoreError> {
        Ok(self.tables.lock().await.list_auto_update())
    }

    async fn get_source(&self, id: SourceId) -> Result<Source, StoreError> {
        self.tables.lock().await.get_source(id)
    }

    async fn save_source(&self, source: &Source) -> Result<(), StoreError> {
        self.tables.lock().await.save_source(source)
    }

    async fn upsert_entry(&self, feed_id: SourceId, entry: NewEntry) -> Result<Upsert, StoreError> {
        self.tables.lock().await.upsert_entry(feed_id, entry)
    }

    async fn upsert_entries(
        &self,
        feed_id: SourceId,
        entries: Vec<NewEntry>,
    ) -> Result<Vec<Upsert>, StoreError> {
        self.tables.lock().await.upsert_entries(feed_id, entries)
    }

    async fn entries_for(&self, feed_id: SourceId) -> Result<Vec<Entry>, StoreError> {
        Ok(self.tables.lock().await.entries_for(feed_id))
    }

    async fn set_entry_read(&self, entry_id: EntryId, is_read: bool) -> Result<Entry, StoreError> {
        self.tables.lock().await.set_entry_read(entry_id, is_read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_auto_update_filters_disabled() {
        let store = MemoryStore::new();
        let on = store.insert_source("https://a", None).await.unwrap();
        let mut off = store.insert_source("https://b", None).await.unwrap();
        off.auto_update = false;
        store.save_source(&off).await.unwrap();

        let eligible = store.list_auto_update().await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, on.id);
    }

    #[tokio::test]
    async fn save_unknown_source_fails() {
        let store = MemoryStore::new();
        let ghost = Source::new(99, "https://ghost", Utc::now());
        assert!(matches!(
            store.save_source(&ghost).await,
            Err(StoreError::SourceNotFound(99))
        ));
    }
}
