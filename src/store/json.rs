//! A store persisted as one JSON snapshot file.
//!
//! A mutation is applied to a copy of the tables, written out, and only then
//! swapped in, all under the table lock. A failed write therefore leaves both
//! the file and the in-memory state as they were.
//!
//! The snapshot goes to a sibling temp file that is synced before it is
//! renamed over the original, so a crash mid-write leaves the previous
//! snapshot readable on filesystems with atomic rename. The directory entry
//! itself is not synced; a crash right after the rename may still surface the
//! older snapshot.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::tables::Tables;
use super::{Store, StoreError, Upsert};
use crate::model::{Entry, EntryId, NewEntry, Source, SourceId};

pub struct JsonStore {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonStore {
    /// Open the snapshot at `path`, starting empty if it does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) => Tables::from_json(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tables::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            tables: Mutex::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, tables: &Tables) -> Result<(), StoreError> {
        let bytes = tables.to_json()?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn insert_source(&self, url: &str, owner: Option<u64>) -> Result<Source, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let source = next.insert_source(url, owner, Utc::now());
        self.flush(&next).await?;
        *tables = next;
        Ok(source)
    }

    async fn list_auto_update(&self) -> Result<Vec<Source>, StoreError> {
        Ok(self.tables.lock().await.list_auto_update())
    }

    async fn get_source(&self, id: SourceId) -> Result<Source, StoreError> {
        self.tables.lock().await.get_source(id)
    }

    async fn save_source(&self, source: &Source) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        next.save_source(source)?;
        self.flush(&next).await?;
        *tables = next;
        Ok(())
    }

    async fn upsert_entry(&self, feed_id: SourceId, entry: NewEntry) -> Result<Upsert, StoreError> {
        let mut outcomes = self.upsert_entries(feed_id, vec![entry]).await?;
        Ok(outcomes.remove(0))
    }

    /// One snapshot write for the whole batch, skipped when nothing changed.
    /// A failing entry discards the batch.
    async fn upsert_entries(
        &self,
        feed_id: SourceId,
        entries: Vec<NewEntry>,
    ) -> Result<Vec<Upsert>, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let outcomes = next.upsert_entries(feed_id, entries)?;
        if outcomes.iter().any(|o| !matches!(o, Upsert::Unchanged(_))) {
            self.flush(&next).await?;
            *tables = next;
        }
        Ok(outcomes)
    }

    async fn entries_for(&self, feed_id: SourceId) -> Result<Vec<Entry>, StoreError> {
        Ok(self.tables.lock().await.entries_for(feed_id))
    }

    async fn set_entry_read(&self, entry_id: EntryId, is_read: bool) -> Result<Entry, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let entry = next.set_entry_read(entry_id, is_read)?;
        self.flush(&next).await?;
        *tables = next;
        Ok(entry)
    }
}
