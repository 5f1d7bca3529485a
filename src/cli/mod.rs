pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "feedcache")]
#[command(about = "Fetch RSS/Atom feeds into a local JSON cache", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/feedcache/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of parallel workers for fetching feeds
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch expired feeds and rebuild the cache if the configuration changed
    Buildcache {
        #[command(flatten)]
        location: Location,
    },
    /// Delete the cache directory
    Clearcache {
        #[command(flatten)]
        location: Location,
    },
    /// List cached feeds, or fetch them live when caching is off
    Show {
        /// Print each feed's items as well
        #[arg(long)]
        items: bool,
    },
    /// Rebuild the cache periodically until interrupted
    Watch {
        /// Interval between builds (e.g., "15m", "1h", "1d")
        #[arg(short, long, default_value = "1h")]
        interval: String,
    },
}

/// Which base directory the cache lives in.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct Location {
    /// Use the user cache directory
    #[arg(long, conflicts_with = "data")]
    pub cache: bool,

    /// Use the user data directory
    #[arg(long)]
    pub data: bool,
}

impl Location {
    /// Override the configured location. An explicit `cache_path` is dropped
    /// when either flag is given.
    pub fn apply(&self, settings: &mut Settings) {
        if self.cache || self.data {
            settings.static_cache = self.data;
            settings.cache_path = None;
        }
    }
}

impl Commands {
    pub fn location(&self) -> Option<&Location> {
        match self {
            Commands::Buildcache { location } | Commands::Clearcache { location } => Some(location),
            _ => None,
        }
    }
}
