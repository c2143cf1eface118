//! Atom 1.0 documents.
//!
//! [`HttpFetcher`](super::HttpFetcher) falls back to this when a body is not
//! RSS. Parsing is done by [`atom_syndication`]; this module only maps a
//! [`Feed`] onto the fetcher-agnostic [`ParsedDocument`].

use atom_syndication::{Entry, Feed, FixedDateTime, Link};

use super::document::{DateParts, ParsedDocument, ParsedEntry};

/// Convert an already-parsed Atom [`Feed`] into a [`ParsedDocument`].
pub fn parse_feed(feed: &Feed) -> ParsedDocument {
    let description = feed
        .subtitle()
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from);

    ParsedDocument {
        title: feed.title().as_str().to_string(),
        description,
        entries: feed.entries().iter().map(parse_entry).collect(),
    }
}

fn parse_entry(entry: &Entry) -> ParsedEntry {
    let title = match entry.title().as_str() {
        "" => "(untitled)".to_string(),
        t => t.to_string(),
    };
    let description = entry
        .summary()
        .map(|s| s.as_str().to_string())
        .or_else(|| entry.content().and_then(|c| c.value()).map(String::from));

    let published = entry.published().map(DateParts::from_datetime);
    let updated = known(entry.updated()).map(DateParts::from_datetime);

    ParsedEntry {
        link: link_of(entry),
        title,
        description,
        published: published.or(updated),
        updated: updated.or(published),
    }
}

/// The `alternate` link, else the first link, else an `id` that is itself a
/// web address.
fn link_of(entry: &Entry) -> String {
    let links = entry.links();
    links
        .iter()
        .find(|l| l.rel() == "alternate")
        .or_else(|| links.first())
        .map(Link::href)
        .filter(|href| !href.is_empty())
        .or_else(|| Some(entry.id()).filter(|id| is_web_address(id)))
        .unwrap_or_default()
        .to_string()
}

fn is_web_address(id: &str) -> bool {
    id.starts_with("http://") || id.starts_with("https://")
}

/// The parser fills a missing `<updated>` with the Unix epoch.
fn known(ts: &FixedDateTime) -> Option<&FixedDateTime> {
    Some(ts).filter(|ts| ts.timestamp() != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Test</title>
  <subtitle>Entries in Atom</subtitle>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <updated>2024-01-05T00:00:00Z</updated>
  <entry>
    <title>First Entry</title>
    <link href="https://e/1"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <published>2024-01-01T00:00:00Z</published>
    <updated>2024-01-03T10:00:00+02:00</updated>
    <summary>Short summary</summary>
  </entry>
  <entry>
    <title>Second Entry</title>
    <link rel="self" href="https://e/2.atom"/>
    <link rel="alternate" href="https://e/2"/>
    <id>tag:example.com,2024:2</id>
    <updated>2024-01-04T00:00:00Z</updated>
    <content type="html">&lt;p&gt;Body&lt;/p&gt;</content>
  </entry>
  <entry>
    <title></title>
    <id>https://e/3</id>
  </entry>
</feed>"#;

    fn parse(xml: &str) -> ParsedDocument {
        parse_feed(&Feed::read_from(xml.as_bytes()).unwrap())
    }

    #[test]
    fn maps_feed_and_entries() {
        let doc = parse(FEED);

        assert_eq!(doc.title, "Atom Test");
        assert_eq!(doc.description.as_deref(), Some("Entries in Atom"));
        assert_eq!(doc.entries.len(), 3);

        let first = &doc.entries[0];
        assert_eq!(first.link, "https://e/1");
        assert_eq!(first.title, "First Entry");
        assert_eq!(first.description.as_deref(), Some("Short summary"));
        assert_eq!(first.published.unwrap().day, 1);
        let updated = first.updated.unwrap();
        assert_eq!((updated.day, updated.hour), (3, 10));
        assert_eq!(updated.offset_secs, 2 * 3600);
    }

    #[test]
    fn prefers_alternate_link_and_falls_back_to_content() {
        let second = &parse(FEED).entries[1];
        assert_eq!(second.link, "https://e/2");
        assert_eq!(second.description.as_deref(), Some("<p>Body</p>"));
        // No <published>, so it mirrors <updated>.
        assert_eq!(second.published, second.updated);
        assert_eq!(second.updated.unwrap().day, 4);
    }

    #[test]
    fn linkless_entry_uses_web_id_and_has_no_dates() {
        let third = &parse(FEED).entries[2];
        assert_eq!(third.link, "https://e/3");
        assert_eq!(third.title, "(untitled)");
        assert!(third.published.is_none());
        assert!(third.updated.is_none());
    }

    #[test]
    fn opaque_id_is_not_a_link() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <title>T</title>
  <entry><title>x</title><id>tag:example.com,2024:9</id></entry>
</feed>"#;
        assert_eq!(parse(xml).entries[0].link, "");
    }
}
