use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::app::Result;
use crate::config::Settings;
use crate::fetcher::{FeedClient, HttpFeedClient};
use crate::orchestrator::FeedCache;

/// Long-lived wiring: settings plus the cache engine and its HTTP client.
pub struct AppContext {
    pub cache: FeedCache,
}

impl AppContext {
    pub fn new(settings: Settings) -> Result<Self> {
        let client: Arc<dyn FeedClient + Send + Sync> =
            Arc::new(HttpFeedClient::new(settings.request.clone())?);
        Self::with_client(settings, client)
    }

    pub fn with_client(settings: Settings, client: Arc<dyn FeedClient + Send + Sync>) -> Result<Self> {
        Ok(Self {
            cache: FeedCache::new(settings, client)?,
        })
    }

    pub fn settings(&self) -> &Settings {
        self.cache.settings()
    }
}

/// Per-invocation inputs: the clock reading and the cancellation signal.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Unix time used for every expiry decision in the run.
    pub now: i64,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new() -> Self {
        Self::at(Utc::now().timestamp())
    }

    pub fn at(now: i64) -> Self {
        Self {
            now,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
