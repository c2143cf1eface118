//! In-memory row storage shared by both store backends.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{StoreError, Upsert};
use crate::model::{Entry, EntryId, NewEntry, Source, SourceId};

/// All rows plus the id counters. This is also the on-disk snapshot format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct Tables {
    next_source_id: SourceId,
    next_entry_id: EntryId,
    sources: BTreeMap<SourceId, Source>,
    entries: BTreeMap<EntryId, Entry>,
    /// `(feed_id, url)` → entry id. Rebuilt after loading.
    #[serde(skip)]
    by_link: HashMap<(SourceId, String), EntryId>,
}

impl Tables {
    pub(super) fn from_json(bytes: &[u8]) -> Result<Self, StoreError> {
        let mut tables: Tables = serde_json::from_slice(bytes)?;
        tables.by_link = tables
            .entries
            .values()
            .map(|e| ((e.feed_id, e.url.clone()), e.id))
            .collect();
        Ok(tables)
    }

    pub(super) fn to_json(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub(super) fn insert_source(
        &mut self,
        url: &str,
        owner: Option<u64>,
        now: DateTime<Utc>,
    ) -> Source {
        self.next_source_id += 1;
        let mut source = Source::new(self.next_source_id, url, now);
        source.owner = owner;
        self.sources.insert(source.id, source.clone());
        source
    }

    pub(super) fn list_auto_update(&self) -> Vec<Source> {
        self.sources
            .values()
            .filter(|s| s.auto_update)
            .cloned()
            .collect()
    }

    pub(super) fn get_source(&self, id: SourceId) -> Result<Source, StoreError> {
        self.sources
            .get(&id)
            .cloned()
            .ok_or(StoreError::SourceNotFound(id))
    }

    pub(super) fn save_source(&mut self, source: &Source) -> Result<(), StoreError> {
        let row = self
            .sources
            .get_mut(&source.id)
            .ok_or(StoreError::SourceNotFound(source.id))?;
        *row = source.clone();
        Ok(())
    }

    pub(super) fn upsert_entry(
        &mut self,
        feed_id: SourceId,
        new: NewEntry,
    ) -> Result<Upsert, StoreError> {
        if !self.sources.contains_key(&feed_id) {
            return Err(StoreError::SourceNotFound(feed_id));
        }

        let key = (feed_id, new.url.clone());
        if let Some(entry) = self
            .by_link
            .get(&key)
            .and_then(|id| self.entries.get_mut(id))
        {
            if new.matches(entry) {
                return Ok(Upsert::Unchanged(entry.id));
            }
            let (published, updated) = new.timestamps(Some(entry));
            entry.title = new.title;
            entry.description = new.description;
            entry.published = Some(published);
            entry.updated = Some(updated);
            return Ok(Upsert::Updated(entry.id));
        }

        let (published, updated) = new.timestamps(None);
        self.next_entry_id += 1;
        let id = self.next_entry_id;
        self.entries.insert(
            id,
            Entry {
                id,
                feed_id,
                url: new.url,
                title: new.title,
                description: new.description,
                published: Some(published),
                updated: Some(updated),
                is_read: false,
            },
        );
        self.by_link.insert(key, id);
        Ok(Upsert::Created(id))
    }

    pub(super) fn upsert_entries(
        &mut self,
        feed_id: SourceId,
        entries: Vec<NewEntry>,
    ) -> Result<Vec<Upsert>, StoreError> {
        entries
            .into_iter()
            .map(|entry| self.upsert_entry(feed_id, entry))
            .collect()
    }

    pub(super) fn entries_for(&self, feed_id: SourceId) -> Vec<Entry> {
        self.entries
            .values()
            .filter(|e| e.feed_id == feed_id)
            .cloned()
            .collect()
    }

    pub(super) fn set_entry_read(
        &mut self,
        entry_id: EntryId,
        is_read: bool,
    ) -> Result<Entry, StoreError> {
        let entry = self
            .entries
            .get_mut(&entry_id)
            .ok_or(StoreError::EntryNotFound(entry_id))?;
        entry.is_read = is_read;
        Ok(entry.clone())
    }
}
