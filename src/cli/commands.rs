use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::app::{AppContext, FeedCacheError, Result, RunContext};
use crate::domain::CachedFeed;
use crate::orchestrator::BuildReport;
use crate::util::{format_interval, human_date};

/// Cancel the returned token on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    cancel
}

pub async fn build_cache(ctx: &AppContext) -> Result<BuildReport> {
    let run = RunContext::new().with_cancel(cancel_on_ctrl_c());

    if ctx.settings().feeds.is_empty() {
        println!("No feeds configured");
    }

    let report = ctx.cache.build(&run).await?;
    print_report(&report);
    Ok(report)
}

fn print_report(report: &BuildReport) {
    println!("Cache {}", report.state);
    for (source, status) in &report.refresh.statuses {
        println!("  {}: {}", source, status);
    }
    println!(
        "Build complete: {} updated, {} failed{}",
        report.refresh.updated(),
        report.refresh.failed(),
        if report.refresh.cancelled {
            " (cancelled)"
        } else {
            ""
        }
    );
}

pub fn clear_cache(ctx: &AppContext) -> Result<()> {
    let status = ctx.cache.clear()?;
    println!("{}", status);
    Ok(())
}

pub async fn show(ctx: &AppContext, items: bool) -> Result<()> {
    let feeds = if ctx.settings().cache {
        ctx.cache.load_feeds()?
    } else {
        let run = RunContext::new().with_cancel(cancel_on_ctrl_c());
        ctx.cache.fetch_live(&run).await?
    };

    print_feeds(&feeds, items);
    Ok(())
}

fn print_feeds(feeds: &BTreeMap<String, CachedFeed>, items: bool) {
    if feeds.is_empty() {
        println!("No cached feeds");
        return;
    }

    for (name, feed) in feeds {
        println!(
            "{} ({} items, last modified {})",
            name,
            feed.items.len(),
            human_date(feed.timestamp)
        );
        if items {
            for item in &feed.items {
                let date = item.last_modified.as_deref().unwrap_or("");
                println!("  {:<25} {}", date, item.display_title());
            }
        }
    }
}

/// Build the cache every `interval_secs` until Ctrl-C.
///
/// A failed cycle is logged and retried on the next tick unless the error
/// means the cache itself is unusable.
pub async fn watch(ctx: &AppContext, interval_secs: u64) -> Result<()> {
    let cancel = cancel_on_ctrl_c();
    tracing::info!(
        "Watching {} feeds (interval: {}, PID: {})",
        ctx.settings().feeds.len(),
        format_interval(interval_secs),
        std::process::id()
    );

    let mut timer = interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {}
        }

        let run = RunContext::new().with_cancel(cancel.clone());
        match ctx.cache.build(&run).await {
            Ok(report) => tracing::info!(
                "Build complete: {} updated, {} failed",
                report.refresh.updated(),
                report.refresh.failed()
            ),
            Err(e @ FeedCacheError::Locked { .. }) => {
                tracing::warn!("Skipping build: {}", e)
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::error!("Build failed: {}", e),
        }
    }

    tracing::info!("Watch stopped");
    Ok(())
}
