//! Document fetching.
//!
//! This module defines the [`Fetcher`] trait, the [`ParsedDocument`] type every
//! fetcher produces, and the failure classification in [`classify`]. The
//! concrete HTTP implementation lives in [`rss`] and reads Atom through
//! [`atom`].
//!
//! ## Adding a new fetcher
//!
//! 1. Create a new file in this directory (e.g. `gemini.rs`).
//! 2. Implement [`Fetcher`] for your struct, reporting what you saw as a
//!    [`RawFetch`]. Do not classify failures yourself.
//! 3. Add `mod gemini;` below and re-export your struct.
//!
//! Reconciliation and the retry lifecycle are fetcher-agnostic.

mod atom;
mod classify;
mod document;
mod rss;

pub use classify::{FailureKind, FetchError, RawFetch, NO_STATUS};
pub use document::{DateParts, ParsedDocument, ParsedEntry};
pub use rss::HttpFetcher;

use std::time::Duration;

use async_trait::async_trait;

/// Retrieves and parses one feed document.
///
/// Implementations must not touch persisted state. They are shared across
/// concurrently running pipelines, so they must be [`Send`] + [`Sync`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and report the raw outcome, dirty flag included.
    async fn fetch(&self, url: &str) -> RawFetch;
}

/// Fetch `url` with an upper bound on wall time and classify the result.
pub async fn fetch_document(
    fetcher: &dyn Fetcher,
    url: &str,
    limit: Duration,
) -> Result<ParsedDocument, FetchError> {
    match tokio::time::timeout(limit, fetcher.fetch(url)).await {
        Ok(raw) => raw.classify(url),
        Err(_) => Err(FetchError::timed_out(url, limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    #[async_trait]
    impl Fetcher for Stalled {
        async fn fetch(&self, _url: &str) -> RawFetch {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            RawFetch::default()
        }
    }

    struct Fixed(RawFetch);

    #[async_trait]
    impl Fetcher for Fixed {
        async fn fetch(&self, _url: &str) -> RawFetch {
            self.0.clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fetch_times_out() {
        let err = fetch_document(&Stalled, "http://slow", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Generic);
        assert_eq!(err.status, NO_STATUS);
    }

    #[tokio::test]
    async fn dirty_fetch_is_classified() {
        let fetcher = Fixed(RawFetch::dirty(404, "gone"));
        let err = fetch_document(&fetcher, "http://x", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::NotFound);
        assert_eq!(err.url, "http://x");
    }
}
