//! Persisted records shared by the refresh engine and the API layer.
//!
//! The serde field names are the storage contract: other layers read and
//! write the same rows, so renaming a field here is a breaking change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identity of a [`Source`].
pub type SourceId = u64;

/// Opaque identity of an [`Entry`].
pub type EntryId = u64;

/// A subscribed feed endpoint tracked for periodic refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    /// Remote address of the feed document.
    pub url: String,
    pub title: String,
    pub description: String,
    /// When this source was added.
    pub created: DateTime<Utc>,
    /// When a fetch was last *attempted*, successful or not.
    pub last_fetched: Option<DateTime<Utc>>,
    /// When reconciliation last changed one of this source's entries.
    pub updated: Option<DateTime<Utc>>,
    /// Eligible for scheduled refresh.
    pub auto_update: bool,
    /// The last attempt failed.
    pub is_failed: bool,
    /// Human-readable outcome of the last attempt.
    pub status: String,
    /// Consecutive retryable failures since the last success.
    pub retries: u32,
    /// Owning account, managed by the API layer.
    #[serde(default)]
    pub owner: Option<u64>,
}

impl Source {
    /// A freshly subscribed source: enabled, not failed, no retries spent.
    pub fn new(id: SourceId, url: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            id,
            url: url.into(),
            title: String::new(),
            description: String::new(),
            created,
            last_fetched: None,
            updated: None,
            auto_update: true,
            is_failed: false,
            status: String::new(),
            retries: 0,
            owner: None,
        }
    }
}

/// One item belonging to a [`Source`].
///
/// `(feed_id, url)` is the natural key used for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub feed_id: SourceId,
    pub url: String,
    pub title: String,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// Owned by the API layer; the refresh engine never changes it.
    pub is_read: bool,
}

/// The mutable fields of an [`Entry`] as produced by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub url: String,
    pub title: String,
    pub description: String,
    /// `None` when the document carried no usable timestamp.
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// Stands in for an absent timestamp, but only when the entry is created.
    pub seen_at: DateTime<Utc>,
}

impl NewEntry {
    /// The `(published, updated)` pair to store.
    ///
    /// An absent timestamp keeps the value already stored on `existing`, so
    /// an undated entry keeps the time it was first seen.
    pub fn timestamps(&self, existing: Option<&Entry>) -> (DateTime<Utc>, DateTime<Utc>) {
        let pick = |parsed: Option<DateTime<Utc>>, stored: Option<DateTime<Utc>>| {
            parsed.or(stored).unwrap_or(self.seen_at)
        };
        (
            pick(self.published, existing.and_then(|e| e.published)),
            pick(self.updated, existing.and_then(|e| e.updated)),
        )
    }

    /// Whether applying this to `entry` would change nothing.
    pub fn matches(&self, entry: &Entry) -> bool {
        let (published, updated) = self.timestamps(Some(entry));
        entry.title == self.title
            && entry.description == self.description
            && entry.published == Some(published)
            && entry.updated == Some(updated)
    }
}
