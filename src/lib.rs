//! # feedcache
//!
//! Fetches RSS/Atom feeds and keeps a JSON cache of them on disk for
//! read-only consumers such as a template layer.
//!
//! ## Architecture
//!
//! ```text
//! Settings → Manifest → Orchestrator → FeedClient → Normalizer → Cache
//! ```
//!
//! - [`store`]: manifest and artifact files, with configuration drift detection
//! - [`orchestrator`]: decides per feed whether to fetch or serve the cache
//! - [`fetcher`]: conditional HTTP fetching behind the `FeedClient` trait
//! - [`normalizer`]: maps parser output onto a stable item shape
//!
//! ## Quick Start
//!
//! ```bash
//! # Fetch everything that is missing or expired
//! feedcache buildcache
//!
//! # List what is cached
//! feedcache show --items
//!
//! # Rebuild every 30 minutes until Ctrl-C
//! feedcache watch --interval 30m
//!
//! # Start over
//! feedcache clearcache
//! ```

/// Application context and error handling.
///
/// [`AppContext`](app::AppContext) wires the settings, HTTP client and cache
/// engine together; [`RunContext`](app::RunContext) carries the clock and
/// cancellation token for one run.
pub mod app;

/// Command-line interface using clap.
///
/// - `buildcache [--cache|--data]` - Fetch stale feeds into the cache
/// - `clearcache [--cache|--data]` - Delete the cache directory
/// - `show [--items]` - List cached feeds
/// - `watch --interval 1h` - Rebuild periodically
pub mod cli;

/// Configuration loaded from `~/.config/feedcache/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`Manifest`](domain::Manifest): per-source cache metadata
/// - [`CachedFeed`](domain::CachedFeed): one cache artifact
/// - [`Item`](domain::Item): a normalized feed entry
pub mod domain;

/// HTTP fetching with conditional request support.
///
/// - [`FeedClient`](fetcher::FeedClient): Async trait for feed fetching
/// - [`HttpFeedClient`](fetcher::HttpFeedClient): reqwest-based implementation
/// - [`ParallelFetcher`](fetcher::ParallelFetcher): Concurrent fetching with semaphore
pub mod fetcher;

/// Raw item to canonical [`Item`](domain::Item) mapping.
pub mod normalizer;

/// Cache build protocol: drift check, then the fetch loop.
pub mod orchestrator;

/// Feed document parsing with feed-rs and quick-xml.
pub mod parser;

/// On-disk manifest, artifacts and run lock.
pub mod store;

/// Date formatting, version comparison and interval parsing.
pub mod util;
