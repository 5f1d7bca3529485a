use std::fmt;
use std::path::{Path, PathBuf};

use crate::app::{FeedCacheError, Result};
use crate::domain::CachedFeed;
use crate::store::write_json_atomic;

/// Per-source feed artifacts stored as `<md5>.json` files.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    pub fn has_artifact(&self, filename: &str) -> bool {
        self.artifact_path(filename).is_file()
    }

    /// Load an artifact. A missing file is `Ok(None)`.
    pub fn read_feed(&self, filename: &str) -> Result<Option<CachedFeed>> {
        let path = self.artifact_path(filename);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FeedCacheError::filesystem(path, e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn write_feed(&self, filename: &str, feed: &CachedFeed) -> Result<PathBuf> {
        let path = self.artifact_path(filename);
        write_json_atomic(&path, feed)?;
        Ok(path)
    }

    /// Delete one artifact. A missing file is not an error.
    pub fn remove_feed(&self, filename: &str) -> Result<()> {
        let path = self.artifact_path(filename);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FeedCacheError::filesystem(path, e)),
        }
    }

    /// Remove the whole cache directory.
    pub fn bust(&self) -> Result<BustStatus> {
        let mut statuses = bust_cache(std::slice::from_ref(&self.dir))?;
        Ok(statuses.remove(0))
    }
}

/// What [`bust_cache`] did with one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BustStatus {
    Removed(PathBuf),
    NotADirectory(PathBuf),
    Missing(PathBuf),
}

impl fmt::Display for BustStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BustStatus::Removed(p) => write!(f, "Removed {}", p.display()),
            BustStatus::NotADirectory(p) => write!(f, "Not a directory: {}", p.display()),
            BustStatus::Missing(p) => write!(f, "Nothing to remove at {}", p.display()),
        }
    }
}

/// Recursively delete each directory in `paths`.
///
/// Paths that are missing or are not directories are reported and left
/// alone. A failed removal is a filesystem error.
pub fn bust_cache(paths: &[PathBuf]) -> Result<Vec<BustStatus>> {
    let mut statuses = Vec::with_capacity(paths.len());

    for path in paths {
        let status = match std::fs::symlink_metadata(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BustStatus::Missing(path.clone()),
            Err(e) => return Err(FeedCacheError::filesystem(path, e)),
            Ok(meta) if !meta.is_dir() => BustStatus::NotADirectory(path.clone()),
            Ok(_) => {
                std::fs::remove_dir_all(path).map_err(|e| FeedCacheError::filesystem(path, e))?;
                BustStatus::Removed(path.clone())
            }
        };
        tracing::info!("{}", status);
        statuses.push(status);
    }

    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Item;

    fn sample_feed() -> CachedFeed {
        CachedFeed {
            title: "Example".into(),
            name: String::new(),
            etag: Some("\"v1\"".into()),
            last_modified: "2024-01-01T00:00:00+00:00".into(),
            timestamp: 1_704_067_200,
            last_checked_at: 1_704_067_200,
            amount: 1,
            items: vec![Item {
                title: Some("Hello".into()),
                link: Some("https://example.com/hello".into()),
                last_modified: None,
                content: None,
                author: None,
                categories: vec![],
                extra_tags: Default::default(),
            }],
        }
    }

    #[test]
    fn test_read_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        assert!(store.read_feed("nope.json").unwrap().is_none());
        assert!(!store.has_artifact("nope.json"));
    }

    #[test]
    fn test_write_and_read_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        let path = store.write_feed("abc.json", &sample_feed()).unwrap();
        assert!(path.is_file());
        assert_eq!(store.read_feed("abc.json").unwrap(), Some(sample_feed()));
    }

    #[test]
    fn test_remove_feed_leaves_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.write_feed("abc.json", &sample_feed()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        store.remove_feed("abc.json").unwrap();
        store.remove_feed("abc.json").unwrap();

        assert!(!store.has_artifact("abc.json"));
        assert!(dir.path().join("notes.txt").is_file());
    }

    #[test]
    fn test_bust_cache_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        std::fs::create_dir_all(cache.join("nested")).unwrap();
        std::fs::write(cache.join("nested").join("a.json"), "{}").unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        let missing = dir.path().join("missing");

        let statuses = bust_cache(&[cache.clone(), file.clone(), missing.clone()]).unwrap();
        assert_eq!(
            statuses,
            vec![
                BustStatus::Removed(cache.clone()),
                BustStatus::NotADirectory(file.clone()),
                BustStatus::Missing(missing),
            ]
        );
        assert!(!cache.exists());
        assert!(file.exists());
    }

    #[test]
    fn test_store_bust() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        store.write_feed("abc.json", &sample_feed()).unwrap();
        assert!(matches!(store.bust().unwrap(), BustStatus::Removed(_)));
        assert!(matches!(store.bust().unwrap(), BustStatus::Missing(_)));
    }
}
