use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{ExtraTag, FeedSpec};
use crate::util::human_date;

/// Cache artifact name for a source: `md5(source)` as lowercase hex plus `.json`.
pub fn cache_filename(source: &str) -> String {
    format!("{:x}.json", md5::compute(source.as_bytes()))
}

/// Persistent registry of per-source cache metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub config: ManifestConfig,
    #[serde(default)]
    pub data: BTreeMap<String, ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestConfig {
    /// Version of the crate that built the manifest.
    pub schema_version: String,
    /// True once built from user configuration; false for a bare skeleton.
    pub built_by: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_at_date: Option<String>,
}

/// Cache metadata for one configured source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub amount: usize,
    #[serde(default)]
    pub etag: Option<String>,
    /// Raw `Last-Modified` header from the last successful fetch.
    #[serde(default)]
    pub last_modified: Option<String>,
    pub cache_time_seconds: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_tags: Vec<ExtraTag>,
    last_checked_at: i64,
    last_checked_date: String,
}

/// Configuration-derived fields of an entry, used for drift detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFields<'a> {
    pub filename: String,
    pub name: Option<&'a str>,
    pub amount: usize,
    pub cache_time_seconds: u64,
    pub extra_tags: &'a [ExtraTag],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestState {
    Unchanged,
    Changed,
}

impl Manifest {
    /// Empty manifest as returned when none exists on disk.
    pub fn skeleton(schema_version: &str) -> Self {
        Self {
            config: ManifestConfig {
                schema_version: schema_version.to_string(),
                built_by: false,
                built_at: None,
                built_at_date: None,
            },
            data: BTreeMap::new(),
        }
    }

    /// Build a manifest from scratch for the given feeds.
    pub fn build(
        schema_version: &str,
        feeds: &[FeedSpec],
        default_cache_time: u64,
        now: i64,
    ) -> Self {
        let data = feeds
            .iter()
            .map(|feed| {
                (
                    feed.source.clone(),
                    ManifestEntry::from_spec(feed, default_cache_time, now),
                )
            })
            .collect();

        Self {
            config: ManifestConfig {
                schema_version: schema_version.to_string(),
                built_by: true,
                built_at: Some(now),
                built_at_date: Some(human_date(now)),
            },
            data,
        }
    }
}

impl ManifestEntry {
    pub fn from_spec(feed: &FeedSpec, default_cache_time: u64, now: i64) -> Self {
        Self {
            filename: feed.filename(),
            name: feed.name.clone(),
            amount: feed.amount(),
            etag: None,
            last_modified: None,
            cache_time_seconds: feed.cache_time_or(default_cache_time),
            extra_tags: feed.extra_tags.clone(),
            last_checked_at: now,
            last_checked_date: human_date(now),
        }
    }

    pub fn last_checked_at(&self) -> i64 {
        self.last_checked_at
    }

    pub fn last_checked_date(&self) -> &str {
        &self.last_checked_date
    }

    /// Record a check at `now`. The timestamp never moves backwards.
    pub fn mark_checked(&mut self, now: i64) {
        self.last_checked_at = self.last_checked_at.max(now);
        self.last_checked_date = human_date(self.last_checked_at);
    }

    /// Unix time at which the cached artifact goes stale.
    pub fn expires_at(&self) -> i64 {
        self.last_checked_at
            .saturating_add(i64::try_from(self.cache_time_seconds).unwrap_or(i64::MAX))
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at() <= now
    }

    pub fn static_fields(&self) -> StaticFields<'_> {
        StaticFields {
            filename: self.filename.clone(),
            name: self.name.as_deref(),
            amount: self.amount,
            cache_time_seconds: self.cache_time_seconds,
            extra_tags: &self.extra_tags,
        }
    }
}

impl<'a> StaticFields<'a> {
    pub fn of_spec(feed: &'a FeedSpec, default_cache_time: u64) -> Self {
        StaticFields {
            filename: feed.filename(),
            name: feed.name.as_deref(),
            amount: feed.amount(),
            cache_time_seconds: feed.cache_time_or(default_cache_time),
            extra_tags: &feed.extra_tags,
        }
    }
}
