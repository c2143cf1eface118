//! HTTP feed fetcher.
//!
//! Fetches a feed over HTTP with [`reqwest`] and parses RSS 2.0 with the
//! [`rss`] crate, or Atom 1.0 through [`super::atom`] when the body is not
//! RSS. Anything other than a cleanly parsed `200 OK` is reported as dirty,
//! with the status code intact, for [`RawFetch::classify`] to sort out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::classify::{RawFetch, NO_STATUS};
use super::document::{DateParts, ParsedDocument, ParsedEntry};
use super::{atom, Fetcher};

/// Fetches RSS and Atom documents over HTTP.
///
/// Holds one connection-pooling [`Client`] shared by every pipeline.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration, user_agent: &str) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Interpret a response body received with `status`.
    ///
    /// Pure (no I/O) so that tests can exercise parsing without a server.
    pub fn parse_body(status: u16, body: &[u8]) -> RawFetch {
        if status != 200 {
            return RawFetch::dirty(status, format!("HTTP {status}"));
        }
        match ::rss::Channel::read_from(body) {
            Ok(channel) => RawFetch::parsed(status, Self::parse_channel(&channel)),
            Err(rss_err) => match atom_syndication::Feed::read_from(body) {
                Ok(feed) => RawFetch::parsed(status, atom::parse_feed(&feed)),
                // Neither format: report the RSS error.
                Err(_) => RawFetch::dirty(status, rss_err.to_string()),
            },
        }
    }

    /// Convert an already-parsed [`rss::Channel`] into a [`ParsedDocument`].
    pub fn parse_channel(channel: &::rss::Channel) -> ParsedDocument {
        let entries = channel
            .items()
            .iter()
            .map(|item| {
                // Prefer <link>, fall back to a permalink <guid>.
                let link = item
                    .link()
                    .map(String::from)
                    .or_else(|| {
                        item.guid()
                            .filter(|g| g.is_permalink())
                            .map(|g| g.value().to_string())
                    })
                    .unwrap_or_default();

                let published = item.pub_date().and_then(DateParts::parse);
                let updated = item
                    .dublin_core_ext()
                    .and_then(|dc| dc.dates().first())
                    .and_then(|d| DateParts::parse(d));

                ParsedEntry {
                    link,
                    title: item.title().unwrap_or("(untitled)").to_string(),
                    description: item.description().map(String::from),
                    published: published.or(updated),
                    updated: updated.or(published),
                }
            })
            .collect();

        let description = Some(channel.description())
            .filter(|d| !d.is_empty())
            .map(String::from);

        ParsedDocument {
            title: channel.title().to_string(),
            description,
            entries,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> RawFetch {
        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                let status = e.status().map_or(NO_STATUS, |s| s.as_u16());
                return RawFetch::dirty(status, e.to_string());
            }
        };

        let status = resp.status().as_u16();
        match resp.bytes().await {
            Ok(body) => Self::parse_body(status, &body),
            Err(e) => RawFetch::dirty(status, e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
