//! On-disk state: the manifest, the cached feed artifacts and the run lock.

pub mod cache;
pub mod lock;
pub mod manifest;

pub use cache::{bust_cache, BustStatus, CacheStore};
pub use lock::CacheLock;
pub use manifest::{compare, ManifestStore, MANIFEST_FILE};

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::app::{FeedCacheError, Result};

/// Serialize `value` as pretty JSON and move it into place atomically.
///
/// The data is written to a temporary file in the target directory and then
/// renamed over `path`, so readers see either the old or the new file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| FeedCacheError::Config(format!("{} has no parent", path.display())))?;
    std::fs::create_dir_all(dir).map_err(|e| FeedCacheError::filesystem(dir, e))?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| FeedCacheError::filesystem(dir, e))?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| FeedCacheError::filesystem(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| FeedCacheError::filesystem(path, e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_json_atomic_creates_dirs_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("value.json");

        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_json_atomic(&path, &vec![4]).unwrap();

        let back: Vec<i32> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec![4]);
        // No temp files left behind
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
