//! Configuration management for feedcache.
//!
//! Configuration is read from `~/.config/feedcache/config.toml` unless a path
//! is given on the command line. If the default file doesn't exist, a
//! commented default configuration is created.

mod request;

pub use request::{RequestOptions, RequestOverrides};

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::manifest::cache_filename;

/// Default time to live for a cached feed, in seconds.
pub const DEFAULT_CACHE_TIME: u64 = 900;
pub const DEFAULT_START: i64 = 0;
pub const DEFAULT_END: i64 = 50;
pub const DEFAULT_WORKERS: usize = 10;

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Write fetched feeds to disk and serve them from there.
    pub cache: bool,
    /// Keep the cache in the data directory instead of the cache directory.
    pub static_cache: bool,
    /// Explicit cache directory, overrides `static_cache`.
    pub cache_path: Option<PathBuf>,
    /// Send ETag/If-Modified-Since when refreshing an expired feed.
    pub pass_headers: bool,
    /// Fallback TTL in seconds for feeds without their own `cache_time`.
    pub cache_time: u64,
    /// Treat certificate failures like any other per-feed failure.
    pub silence_security: bool,
    pub debug: bool,
    /// Maximum number of concurrent fetches.
    pub workers: usize,
    pub request: RequestOptions,
    pub feeds: Vec<FeedSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache: true,
            static_cache: false,
            cache_path: None,
            pass_headers: true,
            cache_time: DEFAULT_CACHE_TIME,
            silence_security: false,
            debug: false,
            workers: DEFAULT_WORKERS,
            request: RequestOptions::default(),
            feeds: Vec::new(),
        }
    }
}

/// A configured feed source and its fetch/display parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedSpec {
    pub source: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
    #[serde(default)]
    pub cache_time: Option<u64>,
    #[serde(default)]
    pub extra_tags: Vec<ExtraTag>,
    #[serde(default)]
    pub request: Option<RequestOverrides>,
}

/// An additional element to capture from each item.
///
/// Either a bare tag name, whose text is captured, or a map from tag name
/// to the attributes to capture from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraTag {
    Element(String),
    Attributes(BTreeMap<String, Vec<String>>),
}

impl FeedSpec {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: None,
            start: None,
            end: None,
            cache_time: None,
            extra_tags: Vec::new(),
            request: None,
        }
    }

    /// Number of items to keep: `|start - end|`.
    pub fn amount(&self) -> usize {
        let start = self.start.unwrap_or(DEFAULT_START);
        let end = self.end.unwrap_or(DEFAULT_END);
        start.abs_diff(end) as usize
    }

    pub fn filename(&self) -> String {
        cache_filename(&self.source)
    }

    pub fn cache_time_or(&self, fallback: u64) -> u64 {
        self.cache_time.unwrap_or(fallback)
    }
}

impl Settings {
    /// Load configuration from `path`, or from the default path.
    ///
    /// A missing default config file is created with comments and the
    /// defaults are returned. A missing explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default_path = Self::default_config_path()?;
                if !default_path.exists() {
                    Self::create_default_config(&default_path)?;
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let settings = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: config_path.clone(),
                source,
            },
            other => other,
        })?;

        Ok(settings)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            source: e,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Sources must be unique absolute URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for feed in &self.feeds {
            url::Url::parse(&feed.source)
                .map_err(|e| ConfigError::Invalid(format!("{}: {}", feed.source, e)))?;
            if !seen.insert(feed.source.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate feed source: {}",
                    feed.source
                )));
            }
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        Ok(())
    }

    /// Get the default config file path: `~/.config/feedcache/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("feedcache").join("config.toml"))
    }

    /// Resolve the directory holding the manifest and cached feeds.
    pub fn cache_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.cache_path {
            return Ok(path.clone());
        }
        let base = if self.static_cache {
            dirs::data_dir()
        } else {
            dirs::cache_dir()
        };
        base.map(|d| d.join("feedcache"))
            .ok_or(ConfigError::NoCacheDir)
    }

    /// TTL for a feed, falling back to the global setting.
    pub fn cache_time_for(&self, feed: &FeedSpec) -> u64 {
        feed.cache_time_or(self.cache_time)
    }

    /// Effective request options for a feed.
    pub fn request_for(&self, feed: &FeedSpec) -> RequestOptions {
        self.request.merged(feed.request.as_ref())
    }

    pub fn feed(&self, source: &str) -> Option<&FeedSpec> {
        self.feeds.iter().find(|f| f.source == source)
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# feedcache configuration

# Write fetched feeds to disk and serve them from there
cache = true

# Keep the cache in the data directory instead of the cache directory
static_cache = false

# Send ETag and Last-Modified back when refreshing a feed
pass_headers = true

# Seconds before a cached feed is fetched again
cache_time = 900

# Do not abort on certificate errors
silence_security = false

# Verbose logging when RUST_LOG is unset
debug = false

# Maximum concurrent fetches
workers = 10

[request]
timeout_secs = 30
connect_timeout_secs = 30
allow_redirects = true
max_redirects = 10
verify_tls = true

# [[feeds]]
# source = "https://blog.rust-lang.org/feed.xml"
# name = "Rust Blog"
# start = 0
# end = 5
# cache_time = 1800
# extra_tags = ["dc:creator", { enclosure = ["url", "type"] }]
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine cache directory")]
    NoCacheDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::app::FeedCacheError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let content = Settings::default_config_content();
        let settings = Settings::from_toml(&content).expect("Default config should be valid TOML");

        assert!(settings.cache);
        assert!(settings.pass_headers);
        assert_eq!(settings.cache_time, DEFAULT_CACHE_TIME);
        assert_eq!(settings.request.timeout_secs, 30);
        assert!(settings.feeds.is_empty());
    }

    #[test]
    fn test_empty_config() {
        let settings = Settings::from_toml("").expect("Empty config should work");
        assert!(settings.cache);
        assert!(!settings.static_cache);
        assert_eq!(settings.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_feeds_with_extra_tags() {
        let content = r##"
cache_time = 600

[[feeds]]
source = "https://example.com/rss.xml"
name = "Example"
end = 5
extra_tags = ["dc:creator", { enclosure = ["url", "type"] }]

[[feeds]]
source = "https://example.org/atom.xml"
cache_time = 60
"##;
        let settings = Settings::from_toml(content).unwrap();
        assert_eq!(settings.feeds.len(), 2);

        let first = &settings.feeds[0];
        assert_eq!(first.amount(), 5);
        assert_eq!(settings.cache_time_for(first), 600);
        assert_eq!(first.extra_tags[0], ExtraTag::Element("dc:creator".into()));
        match &first.extra_tags[1] {
            ExtraTag::Attributes(map) => {
                assert_eq!(map["enclosure"], vec!["url", "type"]);
            }
            other => panic!("unexpected tag {:?}", other),
        }

        let second = &settings.feeds[1];
        assert_eq!(second.amount(), 50);
        assert_eq!(settings.cache_time_for(second), 60);
    }

    #[test]
    fn test_amount_is_absolute_range() {
        let mut feed = FeedSpec::new("https://example.com/feed");
        feed.start = Some(20);
        feed.end = Some(5);
        assert_eq!(feed.amount(), 15);
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let content = r##"
[[feeds]]
source = "https://example.com/rss.xml"

[[feeds]]
source = "https://example.com/rss.xml"
"##;
        let err = Settings::from_toml(content).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_invalid_source_rejected() {
        let content = r##"
[[feeds]]
source = "not a url"
"##;
        assert!(matches!(
            Settings::from_toml(content),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_explicit_cache_path_wins() {
        let settings = Settings {
            cache_path: Some(PathBuf::from("/srv/feeds")),
            static_cache: true,
            ..Default::default()
        };
        assert_eq!(settings.cache_dir().unwrap(), PathBuf::from("/srv/feeds"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        match Settings::load(Some(&missing)) {
            Err(ConfigError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected io error, got {:?}", other),
        }
        // An explicit path is never created on demand
        assert!(!missing.exists());
    }

    #[test]
    fn test_create_default_config_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedcache").join("config.toml");

        Settings::create_default_config(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# feedcache configuration"));
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.cache_time, DEFAULT_CACHE_TIME);
        assert!(settings.feeds.is_empty());
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "cache = \"yes\"").unwrap();
        match Settings::load(Some(&path)) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
