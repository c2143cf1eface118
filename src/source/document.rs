//! The parsed shape of one fetched feed document.
//!
//! Every fetcher converts its native format into a [`ParsedDocument`] so that
//! reconciliation never needs to know which parser produced it.
//!
//! Timestamps stay as [`DateParts`] breakdowns until reconciliation turns them
//! into absolute instants; a feed that omits a date leaves the field `None`
//! and the reconciler decides the fallback.

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike, Utc};

/// A successfully parsed feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    /// Feed-level headline.
    pub title: String,

    /// Feed-level summary, when the document has one.
    pub description: Option<String>,

    /// Entries in document order.
    pub entries: Vec<ParsedEntry>,
}

/// One entry of a [`ParsedDocument`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEntry {
    /// Link to the full content; the de-duplication key within a source.
    ///
    /// Empty when the feed item carries no link.
    pub link: String,

    /// Human-readable headline.
    pub title: String,

    /// Optional longer description or summary text.
    pub description: Option<String>,

    pub published: Option<DateParts>,
    pub updated: Option<DateParts>,
}

/// A calendar date and wall-clock time with the UTC offset it was written in.
///
/// Field values are taken verbatim from the document and are not validated
/// until [`DateParts::to_utc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// Seconds east of UTC.
    pub offset_secs: i32,
}

impl DateParts {
    /// Break down an offset-aware timestamp.
    pub fn from_datetime(dt: &DateTime<FixedOffset>) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            offset_secs: dt.offset().local_minus_utc(),
        }
    }

    /// Parse an RFC 2822 date (RSS `pubDate`), falling back to RFC 3339
    /// (Dublin Core `dc:date`, Atom). Returns `None` for anything else.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        DateTime::parse_from_rfc2822(raw)
            .or_else(|_| DateTime::parse_from_rfc3339(raw))
            .ok()
            .map(|dt| Self::from_datetime(&dt))
    }

    /// The absolute instant these parts describe, or `None` when a component
    /// is out of range (month 13, 31 February, offset beyond ±24h).
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let offset = FixedOffset::east_opt(self.offset_secs)?;
        offset
            .with_ymd_and_hms(
                self.year,
                self.month,
                self.day,
                self.hour,
                self.minute,
                self.second,
            )
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
