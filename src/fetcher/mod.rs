pub mod http_fetcher;
pub mod parallel;

use async_trait::async_trait;

use crate::app::Result;
use crate::config::{ExtraTag, RequestOptions};
use crate::domain::RawFeed;

pub use http_fetcher::HttpFeedClient;
pub use parallel::{FetchAllSummary, FetchJob, ParallelFetcher};

/// A single conditional feed request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    /// Sent as `If-None-Match` when present.
    pub etag: Option<String>,
    /// Sent as `If-Modified-Since` when present.
    pub last_modified: Option<String>,
    pub extra_tags: Vec<ExtraTag>,
    pub options: RequestOptions,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            url: url.into(),
            etag: None,
            last_modified: None,
            extra_tags: Vec::new(),
            options,
        }
    }
}

#[derive(Debug)]
pub enum FetchResult {
    /// New content fetched and parsed
    Content {
        feed: RawFeed,
        etag: Option<String>,
        last_modified: Option<String>,
    },
    /// Content not modified (HTTP 304)
    NotModified,
}

/// Fetches and parses one feed. The HTTP and parsing libraries live behind
/// this trait.
#[async_trait]
pub trait FeedClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult>;
}
