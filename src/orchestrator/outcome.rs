use chrono::{DateTime, Utc};

use crate::app::{FeedCacheError, Result};
use crate::domain::{CachedFeed, RawFeed};
use crate::fetcher::FetchResult;
use crate::normalizer::normalize_all;

/// What a fetch is for, as far as turning its result into an outcome goes.
#[derive(Debug, Clone, Copy)]
pub struct FeedTarget<'a> {
    pub filename: &'a str,
    pub name: Option<&'a str>,
    pub amount: usize,
    /// ETag already on record. Left unset for cold fetches and when headers
    /// are not passed.
    pub known_etag: Option<&'a str>,
    /// No artifact exists yet.
    pub cold: bool,
}

/// Result of one fetch as applied by the coordinator.
#[derive(Debug)]
pub enum FetchOutcome {
    Updated {
        feed: CachedFeed,
        etag: Option<String>,
        last_modified: Option<String>,
    },
    NotModified,
    Failed(FeedCacheError),
}

impl FetchOutcome {
    pub fn classify(result: Result<FetchResult>, target: &FeedTarget<'_>, now: i64) -> Self {
        let (raw, etag, last_modified) = match result {
            Err(e) => return FetchOutcome::Failed(e),
            Ok(FetchResult::NotModified) => return FetchOutcome::NotModified,
            Ok(FetchResult::Content {
                feed,
                etag,
                last_modified,
            }) => (feed, etag, last_modified),
        };

        if !target.cold && etag.is_some() && etag.as_deref() == target.known_etag {
            return FetchOutcome::NotModified;
        }
        // An empty document is never written, not even on a cold fetch
        if raw.items.is_empty() {
            return FetchOutcome::NotModified;
        }

        let feed = assemble_feed(raw, target, etag.clone(), last_modified.as_deref(), now);
        FetchOutcome::Updated {
            feed,
            etag,
            last_modified,
        }
    }
}

/// Build the cache artifact for a freshly fetched document.
pub fn assemble_feed(
    raw: RawFeed,
    target: &FeedTarget<'_>,
    etag: Option<String>,
    last_modified: Option<&str>,
    now: i64,
) -> CachedFeed {
    let header_date = last_modified
        .and_then(|v| DateTime::parse_from_rfc2822(v.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let modified =
        header_date.unwrap_or_else(|| DateTime::<Utc>::from_timestamp(now, 0).unwrap_or_default());

    let title = raw
        .title
        .unwrap_or_else(|| target.filename.to_string());
    let name = target
        .name
        .map(String::from)
        .unwrap_or_else(|| title.clone());
    let items = normalize_all(raw.items, raw.updated.or(header_date), target.amount);

    CachedFeed {
        title,
        name,
        etag,
        last_modified: modified.to_rfc3339(),
        timestamp: modified.timestamp(),
        last_checked_at: now,
        amount: target.amount,
        items,
    }
}
