//! Feed cache orchestration.
//!
//! A build runs in two phases under the cache lock:
//!
//! 1. **prepare**: reconcile the on-disk manifest with the configured feeds.
//!    A missing manifest is written; a manifest from another schema version
//!    or with different feed definitions causes the cache to be busted and
//!    rebuilt.
//! 2. **refresh**: decide per entry whether to fetch (cold or expired) or
//!    skip (fresh), fetch concurrently, and apply each result on the calling
//!    task. The manifest is flushed once at the end.

mod outcome;

pub use outcome::{assemble_feed, FeedTarget, FetchOutcome};

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::app::{FeedCacheError, Result, RunContext};
use crate::config::{FeedSpec, Settings};
use crate::domain::{CachedFeed, Manifest, ManifestEntry, ManifestState};
use crate::fetcher::{FeedClient, FetchJob, FetchRequest, ParallelFetcher};
use crate::store::{self, BustStatus, CacheLock, CacheStore, ManifestStore};

/// How `prepare` found the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No manifest existed; one was written.
    Absent,
    /// Feed definitions drifted; the cache was rebuilt.
    StaleStructure,
    /// Built by an incompatible version; the cache was rebuilt.
    StaleVersion,
    Fresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Fresh,
    Updated { items: usize },
    NotModified,
    Failed(String),
    /// Not fetched because the run stopped early.
    Cancelled,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CacheState::Absent => "built from scratch",
            CacheState::StaleStructure => "rebuilt after a configuration change",
            CacheState::StaleVersion => "rebuilt for a new version",
            CacheState::Fresh => "up to date",
        };
        f.write_str(s)
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Fresh => f.write_str("fresh"),
            SourceStatus::Updated { items } => write!(f, "updated ({} items)", items),
            SourceStatus::NotModified => f.write_str("not modified"),
            SourceStatus::Failed(reason) => write!(f, "failed: {}", reason),
            SourceStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub statuses: BTreeMap<String, SourceStatus>,
    pub cancelled: bool,
}

impl RefreshReport {
    pub fn count(&self, pred: impl Fn(&SourceStatus) -> bool) -> usize {
        self.statuses.values().filter(|s| pred(s)).count()
    }

    pub fn updated(&self) -> usize {
        self.count(|s| matches!(s, SourceStatus::Updated { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, SourceStatus::Failed(_)))
    }
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub state: CacheState,
    pub refresh: RefreshReport,
}

pub struct FeedCache {
    settings: Settings,
    cache: CacheStore,
    manifests: ManifestStore,
    fetcher: ParallelFetcher,
}

impl FeedCache {
    pub fn new(settings: Settings, client: Arc<dyn FeedClient + Send + Sync>) -> Result<Self> {
        let cache_dir = settings.cache_dir()?;
        let fetcher = ParallelFetcher::with_workers(client, settings.workers);
        Ok(Self {
            cache: CacheStore::new(&cache_dir),
            manifests: ManifestStore::new(&cache_dir),
            settings,
            fetcher,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache_dir(&self) -> &Path {
        self.cache.dir()
    }

    pub fn manifest_store(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Reconcile the manifest with the configured feeds.
    pub fn prepare(&self, ctx: &RunContext) -> Result<(Manifest, CacheState)> {
        let feeds = &self.settings.feeds;
        let ttl = self.settings.cache_time;

        if !self.manifests.exists() {
            tracing::info!("No manifest at {}, building", self.manifests.path().display());
            let manifest = self.manifests.write_manifest(feeds, ttl, ctx.now)?;
            // Leftover artifacts are untrusted; dropping them makes each source cold
            for entry in manifest.data.values() {
                self.cache.remove_feed(&entry.filename)?;
            }
            return Ok((manifest, CacheState::Absent));
        }

        let manifest = self.manifests.read_manifest()?;
        let state = if self.manifests.needs_version_rebuild(&manifest) {
            tracing::info!(
                "Manifest built by {} (now {}), rebuilding",
                manifest.config.schema_version,
                self.manifests.schema_version()
            );
            CacheState::StaleVersion
        } else if store::compare(&manifest, feeds, ttl) == ManifestState::Changed {
            tracing::info!("Feed configuration changed, rebuilding");
            CacheState::StaleStructure
        } else {
            return Ok((manifest, CacheState::Fresh));
        };

        self.cache.bust()?;
        let manifest = self.manifests.write_manifest(feeds, ttl, ctx.now)?;
        Ok((manifest, state))
    }

    /// Fetch every cold or expired entry and apply the results.
    ///
    /// Per-source failures are recorded in the report. A certificate error
    /// stops the run unless `silence_security` is set; completed updates are
    /// flushed before it is returned.
    pub async fn refresh(&self, ctx: &RunContext, manifest: &mut Manifest) -> Result<RefreshReport> {
        let mut report = RefreshReport::default();
        let mut jobs = Vec::new();
        let mut cold = HashSet::new();

        for (source, entry) in &manifest.data {
            let Some(spec) = self.settings.feed(source) else {
                tracing::warn!(source = %source, "Manifest entry without a configured feed");
                continue;
            };

            let mut request = FetchRequest::new(source.clone(), self.settings.request_for(spec));
            request.extra_tags = entry.extra_tags.clone();

            // Check the artifact once; staleness comes from the entry in hand
            if !self.cache.has_artifact(&entry.filename) {
                tracing::debug!(source = %source, "No artifact, fetching");
                cold.insert(source.clone());
            } else if entry.is_expired(ctx.now) {
                tracing::debug!(source = %source, expired_at = entry.expires_at(), "Expired, fetching");
                if self.settings.pass_headers {
                    request.etag = entry.etag.clone();
                    request.last_modified = entry.last_modified.clone();
                }
            } else {
                tracing::debug!(source = %source, "Fresh, skipping");
                report.statuses.insert(source.clone(), SourceStatus::Fresh);
                continue;
            }

            jobs.push(FetchJob {
                source: source.clone(),
                request,
            });
        }

        let pending: Vec<String> = jobs.iter().map(|j| j.source.clone()).collect();
        let mut dirty = false;

        let fetched = self
            .fetcher
            .fetch_all(jobs, &ctx.cancel, |source, result| {
                let result = match result {
                    Err(e @ FeedCacheError::Certificate { .. }) if !self.settings.silence_security => {
                        tracing::error!(source = %source, "{}", e);
                        report.statuses.insert(source, SourceStatus::Failed(e.to_string()));
                        return Err(e);
                    }
                    other => other,
                };

                let Some(entry) = manifest.data.get_mut(&source) else {
                    return Ok(());
                };
                let is_cold = cold.contains(&source);
                let target = FeedTarget {
                    filename: &entry.filename,
                    name: entry.name.as_deref(),
                    amount: entry.amount,
                    known_etag: if self.settings.pass_headers && !is_cold {
                        entry.etag.as_deref()
                    } else {
                        None
                    },
                    cold: is_cold,
                };

                let outcome = FetchOutcome::classify(result, &target, ctx.now);
                let status = match outcome {
                    FetchOutcome::Updated {
                        feed,
                        etag,
                        last_modified,
                    } => {
                        let items = feed.items.len();
                        self.cache.write_feed(&entry.filename, &feed)?;
                        entry.etag = etag;
                        entry.last_modified = last_modified;
                        entry.mark_checked(ctx.now);
                        dirty = true;
                        tracing::info!("Cached {} items from {}", items, source);
                        SourceStatus::Updated { items }
                    }
                    FetchOutcome::NotModified => {
                        entry.mark_checked(ctx.now);
                        dirty = true;
                        tracing::debug!("Feed {} not modified", source);
                        SourceStatus::NotModified
                    }
                    FetchOutcome::Failed(e) => {
                        tracing::warn!(source = %source, "Fetch failed: {}", e);
                        // A cold source has nothing to serve and is retried next run
                        if !is_cold {
                            entry.mark_checked(ctx.now);
                            dirty = true;
                        }
                        SourceStatus::Failed(e.to_string())
                    }
                };
                report.statuses.insert(source, status);
                Ok(())
            })
            .await;

        for source in pending {
            report
                .statuses
                .entry(source)
                .or_insert(SourceStatus::Cancelled);
        }

        let flushed = if dirty {
            self.manifests.update_manifest(manifest)
        } else {
            Ok(())
        };

        match fetched {
            Ok(summary) => {
                flushed?;
                report.cancelled = summary.cancelled;
                Ok(report)
            }
            Err(e) => {
                if let Err(flush_err) = flushed {
                    tracing::error!("Failed to flush manifest: {}", flush_err);
                }
                Err(e)
            }
        }
    }

    /// Prepare and refresh the cache while holding the cache lock.
    pub async fn build(&self, ctx: &RunContext) -> Result<BuildReport> {
        let _lock = CacheLock::acquire(self.cache.dir())?;
        let (mut manifest, state) = self.prepare(ctx)?;
        let refresh = self.refresh(ctx, &mut manifest).await?;
        Ok(BuildReport { state, refresh })
    }

    /// Remove the cache directory.
    pub fn clear(&self) -> Result<BustStatus> {
        let _lock = CacheLock::acquire(self.cache.dir())?;
        self.cache.bust()
    }

    /// Cached feeds keyed by display name.
    ///
    /// Missing or unreadable artifacts are skipped.
    pub fn load_feeds(&self) -> Result<BTreeMap<String, CachedFeed>> {
        let manifest = self.manifests.read_manifest()?;
        let mut feeds = BTreeMap::new();

        for (source, entry) in &manifest.data {
            match self.cache.read_feed(&entry.filename) {
                Ok(Some(feed)) => insert_named(&mut feeds, source, feed),
                Ok(None) => tracing::debug!(source = %source, "No cached artifact"),
                Err(e) => tracing::warn!(source = %source, "Unreadable artifact: {}", e),
            }
        }

        Ok(feeds)
    }

    /// Fetch every configured feed without reading or writing the cache.
    pub async fn fetch_live(&self, ctx: &RunContext) -> Result<BTreeMap<String, CachedFeed>> {
        let entries: BTreeMap<&str, (&FeedSpec, ManifestEntry)> = self
            .settings
            .feeds
            .iter()
            .map(|spec| {
                let entry = ManifestEntry::from_spec(spec, self.settings.cache_time, ctx.now);
                (spec.source.as_str(), (spec, entry))
            })
            .collect();

        let jobs = entries
            .iter()
            .map(|(source, (spec, entry))| {
                let mut request =
                    FetchRequest::new(source.to_string(), self.settings.request_for(spec));
                request.extra_tags = entry.extra_tags.clone();
                FetchJob {
                    source: source.to_string(),
                    request,
                }
            })
            .collect();

        let mut feeds = BTreeMap::new();
        self.fetcher
            .fetch_all(jobs, &ctx.cancel, |source, result| {
                let Some((_, entry)) = entries.get(source.as_str()) else {
                    return Ok(());
                };
                let result = match result {
                    Err(e @ FeedCacheError::Certificate { .. }) if !self.settings.silence_security => {
                        return Err(e);
                    }
                    other => other,
                };
                let target = FeedTarget {
                    filename: &entry.filename,
                    name: entry.name.as_deref(),
                    amount: entry.amount,
                    known_etag: None,
                    cold: true,
                };
                match FetchOutcome::classify(result, &target, ctx.now) {
                    FetchOutcome::Updated { feed, .. } => insert_named(&mut feeds, &source, feed),
                    FetchOutcome::NotModified => {}
                    FetchOutcome::Failed(e) => {
                        tracing::warn!(source = %source, "Fetch failed: {}", e)
                    }
                }
                Ok(())
            })
            .await?;

        Ok(feeds)
    }
}

/// Key by display name; a clashing name falls back to the source URL.
fn insert_named(feeds: &mut BTreeMap<String, CachedFeed>, source: &str, feed: CachedFeed) {
    let name = feed.display_title().to_string();
    if feeds.contains_key(&name) {
        feeds.insert(source.to_string(), feed);
    } else {
        feeds.insert(name, feed);
    }
}
