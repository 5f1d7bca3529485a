use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedcache::app::AppContext;
use feedcache::cli::{commands, Cli, Commands};
use feedcache::config::Settings;
use feedcache::util::parse_interval;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    // RUST_LOG wins; otherwise the config's debug flag picks the level
    let level = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("feedcache={},warn", level))),
        )
        .init();

    if let Some(workers) = cli.workers {
        settings.workers = workers;
    }
    if let Some(location) = cli.command.location() {
        location.apply(&mut settings);
    }

    let ctx = AppContext::new(settings)?;

    match cli.command {
        Commands::Buildcache { .. } => {
            commands::build_cache(&ctx).await?;
        }
        Commands::Clearcache { .. } => {
            commands::clear_cache(&ctx)?;
        }
        Commands::Show { items } => {
            commands::show(&ctx, items).await?;
        }
        Commands::Watch { interval } => {
            let secs = parse_interval(&interval).map_err(anyhow::Error::msg)?;
            commands::watch(&ctx, secs).await?;
        }
    }

    Ok(())
}
