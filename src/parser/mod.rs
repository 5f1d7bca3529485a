//! Feed document parsing.
//!
//! feed-rs provides the feed model for RSS 0.9x/1.0/2.0, Atom and JSON Feed.
//! A second pass over the raw XML with quick-xml picks up elements feed-rs
//! does not expose: `dc:date` and the configured extra tags.

mod tags;

pub use tags::{ScannedItem, TagScanner};

use feed_rs::parser;
use html_escape::decode_html_entities;

use crate::app::{FeedCacheError, Result};
use crate::config::ExtraTag;
use crate::domain::{RawFeed, RawItem};

/// Parse a response body into a [`RawFeed`].
pub fn parse_feed(body: &[u8], extra_tags: &[ExtraTag]) -> Result<RawFeed> {
    let feed = parser::parse(body).map_err(|e| FeedCacheError::FeedParse(e.to_string()))?;

    let scanned = match TagScanner::new(extra_tags).scan(body) {
        Ok(scanned) if scanned.len() == feed.entries.len() => scanned,
        Ok(scanned) => {
            tracing::debug!(
                entries = feed.entries.len(),
                scanned = scanned.len(),
                "Raw tag scan does not line up with parsed entries, ignoring it"
            );
            Vec::new()
        }
        Err(e) => {
            tracing::debug!(error = %e, "Raw tag scan failed");
            Vec::new()
        }
    };
    let mut scanned = scanned.into_iter();

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let tags = scanned.next().unwrap_or_default();
            RawItem {
                title: entry.title.map(|t| t.content),
                link: entry.links.first().map(|l| l.href.clone()),
                content: entry.content.and_then(|c| c.body),
                description: entry.summary.map(|s| s.content),
                updated: entry.updated,
                published: entry.published,
                dc_date: tags.dc_date,
                author: entry.authors.first().map(|a| a.name.clone()),
                categories: entry.categories.into_iter().map(|c| c.term).collect(),
                extra_tags: tags.extras,
            }
        })
        .collect();

    Ok(RawFeed {
        title: feed
            .title
            .map(|t| decode_html_entities(t.content.trim()).to_string())
            .filter(|t| !t.is_empty()),
        updated: feed.updated,
        items,
    })
}
