//! Merging a parsed document into persisted state.
//!
//! Entries are upserted keyed by `(source id, link)` and handed to the store
//! as one batch per document. Each upsert is valid on its own, so a batch the
//! store only partly applied is still consistent and the next refresh picks
//! up the rest.

use chrono::{DateTime, Utc};

use crate::model::{NewEntry, Source};
use crate::source::{DateParts, ParsedDocument, ParsedEntry};
use crate::store::{Store, StoreError, Upsert};

/// Counts of what one reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Entries without a link, which cannot be keyed.
    pub skipped: usize,
    /// Missing or invalid timestamps. The store keeps an existing entry's
    /// value for these and uses the fetch time for a new one.
    pub defaulted_timestamps: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.created + self.updated > 0
    }
}

/// Apply `doc` to `source` and upsert its entries.
///
/// Only the in-memory `source` is updated; the caller persists it once the
/// lifecycle outcome has also been applied.
pub async fn reconcile(
    store: &dyn Store,
    source: &mut Source,
    doc: &ParsedDocument,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, StoreError> {
    source.title = doc.title.clone();
    source.description = doc.description.clone().unwrap_or_default();
    source.last_fetched = Some(now);

    let mut report = ReconcileReport::default();
    let mut batch = Vec::with_capacity(doc.entries.len());
    for parsed in &doc.entries {
        if parsed.link.is_empty() {
            report.skipped += 1;
            continue;
        }
        batch.push(to_new_entry(parsed, now, &mut report));
    }

    if !batch.is_empty() {
        for outcome in store.upsert_entries(source.id, batch).await? {
            match outcome {
                Upsert::Created(_) => report.created += 1,
                Upsert::Updated(_) => report.updated += 1,
                Upsert::Unchanged(_) => report.unchanged += 1,
            }
        }
    }

    if report.changed() {
        source.updated = Some(now);
    }
    Ok(report)
}

fn to_new_entry(
    parsed: &ParsedEntry,
    now: DateTime<Utc>,
    report: &mut ReconcileReport,
) -> NewEntry {
    NewEntry {
        url: parsed.link.clone(),
        title: parsed.title.clone(),
        description: parsed.description.clone().unwrap_or_default(),
        published: instant(parsed.published.as_ref(), report),
        updated: instant(parsed.updated.as_ref(), report),
        seen_at: now,
    }
}

fn instant(parts: Option<&DateParts>, report: &mut ReconcileReport) -> Option<DateTime<Utc>> {
    let ts = parts.and_then(DateParts::to_utc);
    if ts.is_none() {
        report.defaulted_timestamps += 1;
    }
    ts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, EntryId, SourceId};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Delegates to a [`MemoryStore`] but only accepts entries in batches.
    #[derive(Default)]
    struct BatchOnlyStore {
        inner: MemoryStore,
        batches: AtomicUsize,
    }

    #[async_trait]
    impl Store for BatchOnlyStore {
        async fn insert_source(&self, url: &str, owner: Option<u64>) -> Result<Source, StoreError> {
            self.inner.insert_source(url, owner).await
        }
        async fn list_auto_update(&self) -> Result<Vec<Source>, StoreError> {
            self.inner.list_auto_update().await
        }
        async fn get_source(&self, id: SourceId) -> Result<Source, StoreError> {
            self.inner.get_source(id).await
        }
        async fn save_source(&self, source: &Source) -> Result<(), StoreError> {
            self.inner.save_source(source).await
        }
        async fn upsert_entry(&self, _: SourceId, _: NewEntry) -> Result<Upsert, StoreError> {
            panic!("entries must arrive as one batch");
        }
        async fn upsert_entries(
            &self,
            feed_id: SourceId,
            entries: Vec<NewEntry>,
        ) -> Result<Vec<Upsert>, StoreError> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.inner.upsert_entries(feed_id, entries).await
        }
        async fn entries_for(&self, feed_id: SourceId) -> Result<Vec<Entry>, StoreError> {
            self.inner.entries_for(feed_id).await
        }
        async fn set_entry_read(&self, id: EntryId, is_read: bool) -> Result<Entry, StoreError> {
            self.inner.set_entry_read(id, is_read).await
        }
    }

    fn parts(day: u32) -> DateParts {
        DateParts {
            year: 2024,
            month: 1,
            day,
            hour: 0,
            minute: 0,
            second: 0,
            offset_secs: 0,
        }
    }

    fn entry(link: &str, title: &str) -> ParsedEntry {
        ParsedEntry {
            link: link.into(),
            title: title.into(),
            description: None,
            published: Some(parts(1)),
            updated: Some(parts(2)),
        }
    }

    fn doc(entries: Vec<ParsedEntry>) -> ParsedDocument {
        ParsedDocument {
            title: "Feed".into(),
            description: None,
            entries,
        }
    }

    async fn setup() -> (MemoryStore, Source) {
        let store = MemoryStore::new();
        let source = store
            .insert_source("https://example.com/feed", None)
            .await
            .unwrap();
        (store, source)
    }

    #[tokio::test]
    async fn updates_source_metadata() {
        let (store, mut source) = setup().await;
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

        let report = reconcile(&store, &mut source, &doc(vec![]), now).await.unwrap();

        assert_eq!(source.title, "Feed");
        assert_eq!(source.description, "");
        assert_eq!(source.last_fetched, Some(now));
        assert!(source.updated.is_none(), "nothing changed");
        assert_eq!(report, ReconcileReport::default());
    }

    #[tokio::test]
    async fn same_link_twice_overwrites_instead_of_duplicating() {
        let (store, mut source) = setup().await;
        let now = Utc::now();

        let old = doc(vec![entry("https://e/1", "Old title")]);
        let new = doc(vec![entry("https://e/1", "New title")]);
        reconcile(&store, &mut source, &old, now).await.unwrap();
        let report = reconcile(&store, &mut source, &new, now).await.unwrap();

        assert_eq!(report.updated, 1);
        let entries = store.entries_for(source.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "New title");
        assert!(!entries[0].is_read);
    }

    #[tokio::test]
    async fn reconciling_same_document_is_idempotent() {
        let (store, mut source) = setup().await;
        let document = doc(vec![entry("https://e/1", "A"), entry("https://e/2", "B")]);

        let first = reconcile(&store, &mut source, &document, Utc::now())
            .await
            .unwrap();
        let second = reconcile(&store, &mut source, &document, Utc::now())
            .await
            .unwrap();

        assert_eq!(first.created, 2);
        assert_eq!(second.unchanged, 2);
        let links: Vec<_> = store
            .entries_for(source.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.url)
            .collect();
        assert_eq!(links, vec!["https://e/1", "https://e/2"]);
    }

    #[tokio::test]
    async fn converts_date_parts_to_instants() {
        let (store, mut source) = setup().await;
        let document = doc(vec![entry("https://e/1", "A")]);
        reconcile(&store, &mut source, &document, Utc::now())
            .await
            .unwrap();

        let e = &store.entries_for(source.id).await.unwrap()[0];
        let day = |d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        assert_eq!(e.published, Some(day(1)));
        assert_eq!(e.updated, Some(day(2)));
    }

    #[tokio::test]
    async fn missing_timestamps_default_to_fetch_time() {
        let (store, mut source) = setup().await;
        let now = Utc.with_ymd_and_hms(2025, 5, 5, 5, 5, 5).unwrap();
        let mut undated = entry("https://e/1", "A");
        undated.published = None;
        undated.updated = Some(DateParts { month: 13, ..parts(1) });

        let report = reconcile(&store, &mut source, &doc(vec![undated]), now)
            .await
            .unwrap();

        assert_eq!(report.defaulted_timestamps, 2);
        let e = &store.entries_for(source.id).await.unwrap()[0];
        assert_eq!(e.published, Some(now));
        assert_eq!(e.updated, Some(now));
    }

    #[tokio::test]
    async fn undated_entry_is_unchanged_on_later_refresh() {
        let (store, mut source) = setup().await;
        let t1 = Utc.with_ymd_and_hms(2025, 5, 5, 5, 0, 0).unwrap();
        let t2 = t1 + chrono::Duration::minutes(2);
        let mut undated = entry("https://e/1", "A");
        undated.published = None;
        undated.updated = None;
        let document = doc(vec![undated]);

        reconcile(&store, &mut source, &document, t1).await.unwrap();
        let report = reconcile(&store, &mut source, &document, t2).await.unwrap();

        assert_eq!(report.unchanged, 1);
        assert!(!report.changed());
        assert_eq!(source.updated, Some(t1));
        assert_eq!(source.last_fetched, Some(t2));
        let e = &store.entries_for(source.id).await.unwrap()[0];
        assert_eq!(e.published, Some(t1));
        assert_eq!(e.updated, Some(t1));
    }

    #[tokio::test]
    async fn undated_refetch_keeps_stored_time_when_title_changes() {
        let (store, mut source) = setup().await;
        let t1 = Utc.with_ymd_and_hms(2025, 5, 5, 5, 0, 0).unwrap();
        let t2 = t1 + chrono::Duration::minutes(2);
        let mut undated = entry("https://e/1", "A");
        undated.published = None;
        undated.updated = None;
        let mut renamed = undated.clone();
        renamed.title = "B".into();

        reconcile(&store, &mut source, &doc(vec![undated]), t1)
            .await
            .unwrap();
        let report = reconcile(&store, &mut source, &doc(vec![renamed]), t2)
            .await
            .unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(source.updated, Some(t2));
        let e = &store.entries_for(source.id).await.unwrap()[0];
        assert_eq!(e.title, "B");
        assert_eq!(e.published, Some(t1));
    }

    #[tokio::test]
    async fn document_is_stored_as_one_batch() {
        let store = BatchOnlyStore::default();
        let mut source = store.insert_source("https://a", None).await.unwrap();
        let document = doc(vec![
            entry("https://e/1", "A"),
            entry("", "No link"),
            entry("https://e/2", "B"),
        ]);

        let report = reconcile(&store, &mut source, &document, Utc::now())
            .await
            .unwrap();
        reconcile(&store, &mut source, &doc(vec![]), Utc::now())
            .await
            .unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            store.batches.load(Ordering::SeqCst),
            1,
            "empty batches are not sent"
        );
    }

    #[tokio::test]
    async fn entries_without_link_are_skipped() {
        let (store, mut source) = setup().await;
        let report = reconcile(
            &store,
            &mut source,
            &doc(vec![entry("", "No link"), entry("https://e/1", "A")]),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 1);
        assert_eq!(store.entries_for(source.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn description_defaults_to_empty() {
        let (store, mut source) = setup().await;
        let mut with_desc = entry("https://e/2", "B");
        with_desc.description = Some("text".into());
        reconcile(
            &store,
            &mut source,
            &doc(vec![entry("https://e/1", "A"), with_desc]),
            Utc::now(),
        )
        .await
        .unwrap();

        let entries = store.entries_for(source.id).await.unwrap();
        assert_eq!(entries[0].description, "");
        assert_eq!(entries[1].description, "text");
    }
}
