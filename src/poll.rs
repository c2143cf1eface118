//! Refresh orchestration.
//!
//! [`Refresher`] drives each eligible source through fetch → reconcile →
//! lifecycle → persist. Sources are independent: each pipeline runs as its own
//! task, bounded by a semaphore, and whatever goes wrong inside one (a
//! classified fetch failure, a store error, a panic) is contained there and
//! counted in [`RunStats`].
//!
//! [`Scheduler`] calls [`Refresher::run_until`] on a fixed period. Runs never
//! overlap: the ticker skips missed ticks while a run is in progress, and a
//! run started from elsewhere while another holds the run gate returns
//! immediately with [`RunStats::skipped`] set.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::lifecycle::{self, Outcome, Phase};
use crate::model::{Source, SourceId};
use crate::reconcile::reconcile;
use crate::source::{fetch_document, FetchError, Fetcher};
use crate::store::{Store, StoreError};

/// Knobs for a [`Refresher`].
#[derive(Debug, Clone, Copy)]
pub struct RefreshSettings {
    /// Upper bound on one source's fetch.
    pub fetch_timeout: Duration,
    /// Pipelines allowed to run at once within a run.
    pub max_concurrency: usize,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            max_concurrency: 8,
        }
    }
}

/// Counts from one [`Refresher::run_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Sources with `auto_update` set when the run began.
    pub eligible: usize,
    pub succeeded: usize,
    /// Classified fetch failures, recorded on the source.
    pub failed: usize,
    /// Pipelines that broke for other reasons (store errors, panics).
    pub errored: usize,
    /// Sources not started because shutdown was requested.
    pub not_started: usize,
    /// Another run was in progress; nothing was done.
    pub skipped: bool,
}

impl RunStats {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Errors from [`Refresher::refresh`].
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("source {0} not found")]
    NotFound(SourceId),

    /// The fetch failed; the outcome has already been recorded on the source.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RefreshError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SourceNotFound(id) => RefreshError::NotFound(id),
            other => RefreshError::Store(other),
        }
    }
}

/// Runs the single-source pipeline for one source or all eligible ones.
///
/// Cheap to clone; clones share the store, the fetcher and the run gate.
#[derive(Clone)]
pub struct Refresher {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn Fetcher>,
    settings: RefreshSettings,
    run_gate: Arc<Mutex<()>>,
}

impl Refresher {
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn Fetcher>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            store,
            fetcher,
            settings,
            run_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Refresh every eligible source once.
    pub async fn run_all(&self) -> RunStats {
        let (_never, shutdown) = watch::channel(false);
        self.run_until(shutdown).await
    }

    /// Refresh every eligible source once, starting no new pipelines after
    /// `shutdown` turns true. Pipelines already started run to completion.
    pub async fn run_until(&self, shutdown: watch::Receiver<bool>) -> RunStats {
        let Ok(_gate) = self.run_gate.try_lock() else {
            info!("refresh run already in progress, skipping");
            return RunStats::skipped();
        };

        let sources = match self.store.list_auto_update().await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(error = %e, "could not list eligible sources");
                return RunStats {
                    errored: 1,
                    ..RunStats::default()
                };
            }
        };

        let mut stats = RunStats {
            eligible: sources.len(),
            ..RunStats::default()
        };
        info!(count = stats.eligible, "refreshing eligible sources");

        let permits = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut pending = sources.into_iter();

        while let Some(source) = pending.next() {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            if *shutdown.borrow() {
                stats.not_started = 1 + pending.len();
                info!(
                    remaining = stats.not_started,
                    "shutdown requested, not starting remaining sources"
                );
                break;
            }

            let this = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let id = source.id;
                (id, this.refresh_source(source).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok((_, Outcome::Success)))) => stats.succeeded += 1,
                Ok((_, Ok((_, Outcome::Failure(_))))) => stats.failed += 1,
                Ok((id, Err(e))) => {
                    warn!(source = id, error = %e, "refresh pipeline failed");
                    stats.errored += 1;
                }
                Err(e) => {
                    warn!(error = %e, "refresh pipeline aborted");
                    stats.errored += 1;
                }
            }
        }

        info!(
            eligible = stats.eligible,
            succeeded = stats.succeeded,
            failed = stats.failed,
            errored = stats.errored,
            not_started = stats.not_started,
            "refresh run finished"
        );
        stats
    }

    /// Manual refresh: clear the source's failure state, then run its
    /// pipeline immediately.
    ///
    /// On a classified fetch failure the new lifecycle state is persisted
    /// before [`RefreshError::Fetch`] is returned.
    pub async fn refresh(&self, id: SourceId) -> Result<Source, RefreshError> {
        let mut source = self.store.get_source(id).await?;
        lifecycle::reset(&mut source);
        self.store.save_source(&source).await?;

        match self.refresh_source(source).await? {
            (source, Outcome::Success) => Ok(source),
            (_, Outcome::Failure(e)) => Err(RefreshError::Fetch(e)),
        }
    }

    /// The single-source pipeline. Returns the persisted source and the
    /// outcome that was applied to it.
    pub async fn refresh_source(
        &self,
        mut source: Source,
    ) -> Result<(Source, Outcome), StoreError> {
        let started = Utc::now();
        source.last_fetched = Some(started);
        self.store.save_source(&source).await?;

        let fetched = fetch_document(
            self.fetcher.as_ref(),
            &source.url,
            self.settings.fetch_timeout,
        )
        .await;
        let outcome = match fetched {
            Ok(doc) => {
                let report =
                    reconcile(self.store.as_ref(), &mut source, &doc, started).await?;
                debug!(
                    url = %source.url,
                    created = report.created,
                    updated = report.updated,
                    unchanged = report.unchanged,
                    skipped = report.skipped,
                    defaulted_timestamps = report.defaulted_timestamps,
                    "reconciled"
                );
                Outcome::Success
            }
            Err(err) => {
                warn!(
                    url = %source.url,
                    kind = %err.kind,
                    status = err.status,
                    "{}",
                    err.message
                );
                Outcome::Failure(err)
            }
        };

        lifecycle::apply(&mut source, &outcome);
        if Phase::of(&source) == Phase::Disabled {
            info!(
                url = %source.url,
                retries = source.retries,
                "auto-update disabled"
            );
        }
        self.store.save_source(&source).await?;
        Ok((source, outcome))
    }
}

/// Invokes [`Refresher::run_until`] on a fixed period.
pub struct Scheduler {
    refresher: Refresher,
    period: Duration,
}

impl Scheduler {
    pub fn new(refresher: Refresher, period: Duration) -> Self {
        Self { refresher, period }
    }

    /// Run until `shutdown` turns true or its sender is dropped. The first
    /// run starts immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.refresher.run_until(shutdown.clone()).await;
                }
            }
        }
        info!("scheduler stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
