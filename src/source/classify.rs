//! Failure classification for fetch results.
//!
//! A fetcher reports what it saw as a [`RawFetch`]: the HTTP status, whether
//! the document was *dirty* (unreachable or malformed), and the parsed document
//! if there is one. [`RawFetch::classify`] turns that into either a
//! [`ParsedDocument`] or a [`FetchError`] tagged with a [`FailureKind`], which
//! is all the retry lifecycle needs to decide what happens next.

use std::fmt;
use std::time::Duration;

use super::document::ParsedDocument;

/// Status reported when no HTTP response was received at all.
pub const NO_STATUS: u16 = 0;

/// What a fetcher observed for one address, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFetch {
    /// HTTP status, or [`NO_STATUS`] for transport failures.
    pub status: u16,
    /// The document could not be cleanly retrieved or parsed.
    pub dirty: bool,
    /// Underlying error text, if any.
    pub cause: Option<String>,
    pub document: Option<ParsedDocument>,
}

impl RawFetch {
    /// A clean result.
    pub fn parsed(status: u16, document: ParsedDocument) -> Self {
        Self {
            status,
            dirty: false,
            cause: None,
            document: Some(document),
        }
    }

    /// A dirty result carrying the underlying cause.
    pub fn dirty(status: u16, cause: impl Into<String>) -> Self {
        Self {
            status,
            dirty: true,
            cause: Some(cause.into()),
            document: None,
        }
    }

    /// Apply the classification policy for a fetch of `url`.
    pub fn classify(self, url: &str) -> Result<ParsedDocument, FetchError> {
        if self.dirty {
            let cause = self.cause.unwrap_or_else(|| "unknown error".into());
            return Err(FetchError::from_status(self.status, &cause, url));
        }

        match (self.status, self.document) {
            (200, Some(document)) => Ok(document),
            (200, None) => Err(FetchError::from_status(200, "empty document", url)),
            (status, _) => Err(FetchError::new(
                FailureKind::Generic,
                format!("Feed error: unexpected status {status}"),
                status,
                url,
            )),
        }
    }
}

/// The failure classes the retry lifecycle distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    ServerError,
    NotFound,
    Forbidden,
    Unauthorized,
    Unparsable,
    Generic,
}

impl FailureKind {
    /// Whether the source stays eligible for automatic retries.
    ///
    /// A missing or access-controlled feed will not fix itself, so those
    /// disable the source immediately.
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureKind::NotFound | FailureKind::Unauthorized)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::ServerError => "server-error",
            FailureKind::NotFound => "not-found",
            FailureKind::Forbidden => "forbidden",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::Unparsable => "unparsable",
            FailureKind::Generic => "generic",
        };
        f.write_str(s)
    }
}

/// A classified fetch failure.
///
/// `message` becomes the source's persisted `status` text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (status {status}, {url})")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
    pub status: u16,
    pub url: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>, status: u16, url: &str) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
            url: url.to_string(),
        }
    }

    /// Classify a dirty result by its status code.
    pub fn from_status(status: u16, cause: &str, url: &str) -> Self {
        match status {
            500..=599 => Self::new(
                FailureKind::ServerError,
                format!("Server error: {status}"),
                status,
                url,
            ),
            404 => Self::new(FailureKind::NotFound, "Feed not found", status, url),
            403 => Self::new(FailureKind::Forbidden, "Feed forbidden", status, url),
            401 => Self::new(
                FailureKind::Unauthorized,
                "Feed unauthorized",
                status,
                url,
            ),
            200 => Self::new(FailureKind::Unparsable, "Feed unparsable", status, url),
            _ => Self::new(
                FailureKind::Generic,
                format!("Feed error: {cause}"),
                status,
                url,
            ),
        }
    }

    /// The fetch did not finish within `limit`.
    pub fn timed_out(url: &str, limit: Duration) -> Self {
        Self::from_status(
            NO_STATUS,
            &format!("timed out after {}s", limit.as_secs()),
            url,
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
