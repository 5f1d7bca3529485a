use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::app::{FeedCacheError, Result};
use crate::config::DEFAULT_WORKERS;
use crate::fetcher::{FeedClient, FetchRequest, FetchResult};

/// One source to fetch.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub source: String,
    pub request: FetchRequest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchAllSummary {
    pub completed: usize,
    pub cancelled: bool,
}

/// Runs fetches concurrently, bounded by a semaphore.
///
/// Workers only talk to the network. Results are handed back one at a time
/// to the caller's task, which is the only place state may be mutated.
pub struct ParallelFetcher {
    client: Arc<dyn FeedClient + Send + Sync>,
    semaphore: Arc<Semaphore>,
}

impl ParallelFetcher {
    pub fn new(client: Arc<dyn FeedClient + Send + Sync>) -> Self {
        Self::with_workers(client, DEFAULT_WORKERS)
    }

    pub fn with_workers(client: Arc<dyn FeedClient + Send + Sync>, workers: usize) -> Self {
        Self {
            client,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Fetch every job and feed each result to `on_result` as it completes.
    ///
    /// If `cancel` fires, outstanding fetches are aborted; results that had
    /// already completed are still delivered. An error from `on_result`
    /// aborts the remaining fetches and is returned.
    pub async fn fetch_all<F>(
        &self,
        jobs: Vec<FetchJob>,
        cancel: &CancellationToken,
        mut on_result: F,
    ) -> Result<FetchAllSummary>
    where
        F: FnMut(String, Result<FetchResult>) -> Result<()>,
    {
        let mut set = JoinSet::new();

        for job in jobs {
            let client = self.client.clone();
            let semaphore = self.semaphore.clone();

            set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => fetch_with_timeout(client.as_ref(), &job.request).await,
                    Err(_) => Err(FeedCacheError::Network("worker pool closed".into())),
                };
                (job.source, result)
            });
        }

        let mut summary = FetchAllSummary::default();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Fetch cancelled, abandoning in-flight requests");
                    set.abort_all();
                    summary.cancelled = true;
                    break;
                }
                joined = set.join_next() => match joined {
                    None => return Ok(summary),
                    Some(Ok((source, result))) => {
                        summary.completed += 1;
                        if let Err(e) = on_result(source, result) {
                            set.abort_all();
                            return Err(e);
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!("Task join error: {}", e);
                    }
                }
            }
        }

        // Tasks that finished before the abort still yield their results.
        while let Some(joined) = set.join_next().await {
            if let Ok((source, result)) = joined {
                summary.completed += 1;
                on_result(source, result)?;
            }
        }

        Ok(summary)
    }
}

async fn fetch_with_timeout(
    client: &(dyn FeedClient + Send + Sync),
    request: &FetchRequest,
) -> Result<FetchResult> {
    let limit = request.options.timeout();
    match tokio::time::timeout(limit, client.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(FeedCacheError::Network(format!(
            "timed out after {}s",
            limit.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::RequestOptions;
    use crate::domain::RawFeed;

    /// Sleeps for the number of milliseconds in the URL path.
    struct SleepyClient {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl FeedClient for SleepyClient {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let ms: u64 = request
                .url
                .rsplit('/')
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(FetchResult::Content {
                feed: RawFeed::default(),
                etag: None,
                last_modified: None,
            })
        }
    }

    fn job(ms: u64, timeout_secs: u64) -> FetchJob {
        let url = format!("https://example.com/{}", ms);
        let options = RequestOptions {
            timeout_secs,
            ..Default::default()
        };
        FetchJob {
            source: url.clone(),
            request: FetchRequest::new(url, options),
        }
    }

    fn sleepy() -> Arc<SleepyClient> {
        Arc::new(SleepyClient {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let client = sleepy();
        let fetcher = ParallelFetcher::with_workers(client.clone(), 2);
        let jobs = (0..6).map(|i| job(20 + i, 5)).collect();

        let mut seen = 0;
        let summary = fetcher
            .fetch_all(jobs, &CancellationToken::new(), |_, result| {
                assert!(result.is_ok());
                seen += 1;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(seen, 6);
        assert_eq!(summary.completed, 6);
        assert!(!summary.cancelled);
        assert!(client.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_timeout_becomes_network_error() {
        let fetcher = ParallelFetcher::new(sleepy());
        let mut errors = Vec::new();
        fetcher
            .fetch_all(vec![job(3_000, 1)], &CancellationToken::new(), |source, result| {
                errors.push((source, result.err()));
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].1, Some(FeedCacheError::Network(_))));
    }

    #[tokio::test]
    async fn test_cancel_keeps_completed_results() {
        let fetcher = ParallelFetcher::new(sleepy());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let mut done = Vec::new();
        let summary = fetcher
            .fetch_all(vec![job(10, 30), job(20_000, 30)], &cancel, |source, _| {
                done.push(source);
                Ok(())
            })
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(done, vec!["https://example.com/10".to_string()]);
    }

    #[tokio::test]
    async fn test_callback_error_aborts() {
        let fetcher = ParallelFetcher::new(sleepy());
        let result = fetcher
            .fetch_all(vec![job(1, 5), job(5_000, 10)], &CancellationToken::new(), |_, _| {
                Err(FeedCacheError::Config("stop".into()))
            })
            .await;
        assert!(matches!(result, Err(FeedCacheError::Config(_))));
    }
}
