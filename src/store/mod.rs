//! Persistence interface for sources and their entries.
//!
//! The refresh engine only needs the handful of operations on [`Store`]; the
//! API layer shares the same rows through its own access path. Two backends
//! are provided: [`MemoryStore`] and the file-backed [`JsonStore`]. Both
//! serialize writes through one mutex, which is what gives single-writer
//! semantics per source row.

mod json;
mod memory;
mod tables;

pub use json::JsonStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::model::{Entry, EntryId, NewEntry, Source, SourceId};

/// Errors raised by a [`Store`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("source {0} not found")]
    SourceNotFound(SourceId),

    #[error("entry {0} not found")]
    EntryNotFound(EntryId),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store (de)serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What [`Store::upsert_entry`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created(EntryId),
    Updated(EntryId),
    /// An entry with the same key already held identical values.
    Unchanged(EntryId),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Subscribe to a new feed with a fresh lifecycle.
    async fn insert_source(&self, url: &str, owner: Option<u64>) -> Result<Source, StoreError>;

    /// All sources eligible for scheduled refresh.
    async fn list_auto_update(&self) -> Result<Vec<Source>, StoreError>;

    async fn get_source(&self, id: SourceId) -> Result<Source, StoreError>;

    /// Overwrite the stored row with the same id.
    async fn save_source(&self, source: &Source) -> Result<(), StoreError>;

    /// Insert or overwrite the entry keyed by `(feed_id, entry.url)`.
    ///
    /// An existing entry keeps its id and read flag.
    async fn upsert_entry(&self, feed_id: SourceId, entry: NewEntry) -> Result<Upsert, StoreError>;

    /// Upsert a batch of entries of one source, returning one outcome per
    /// entry in order.
    ///
    /// Backends that persist on every write override this to persist once per
    /// batch.
    async fn upsert_entries(
        &self,
        feed_id: SourceId,
        entries: Vec<NewEntry>,
    ) -> Result<Vec<Upsert>, StoreError> {
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            outcomes.push(self.upsert_entry(feed_id, entry).await?);
        }
        Ok(outcomes)
    }

    /// Entries of one source, ordered by id.
    async fn entries_for(&self, feed_id: SourceId) -> Result<Vec<Entry>, StoreError>;

    async fn set_entry_read(&self, entry_id: EntryId, is_read: bool) -> Result<Entry, StoreError>;
}
