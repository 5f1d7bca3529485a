use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::app::{FeedCacheError, Result};

/// Advisory lock guarding a cache directory against concurrent builds.
///
/// The lock is a `<cache dir>.lock` file next to the directory holding the
/// owner's PID, so busting the directory leaves it in place. A lock whose
/// owner is no longer running is taken over. Dropping the guard releases it.
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
}

impl CacheLock {
    pub fn lock_path(cache_dir: &Path) -> PathBuf {
        let name = cache_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "feedcache".to_string());
        cache_dir.with_file_name(format!("{}.lock", name))
    }

    pub fn acquire(cache_dir: &Path) -> Result<Self> {
        let path = Self::lock_path(cache_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FeedCacheError::filesystem(parent, e))?;
        }

        // Second attempt only happens after clearing a stale lock
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())
                        .map_err(|e| FeedCacheError::filesystem(&path, e))?;
                    tracing::debug!(path = %path.display(), "Acquired cache lock");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let holder = fs::read_to_string(&path)
                        .ok()
                        .and_then(|s| s.trim().parse::<u32>().ok());
                    match holder {
                        Some(pid) if pid != std::process::id() && !process_exists(pid) => {
                            tracing::warn!(pid, "Removing stale cache lock");
                            match fs::remove_file(&path) {
                                Ok(()) => continue,
                                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                                Err(e) => return Err(FeedCacheError::filesystem(&path, e)),
                            }
                        }
                        // Unreadable contents mean the owner is still writing
                        holder => {
                            return Err(FeedCacheError::Locked {
                                path,
                                pid: holder.unwrap_or(0),
                            })
                        }
                    }
                }
                Err(e) => return Err(FeedCacheError::filesystem(&path, e)),
            }
        }

        Err(FeedCacheError::Locked { path, pid: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to release cache lock");
            }
        }
    }
}

#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(windows)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid)])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_path_is_sibling() {
        let path = CacheLock::lock_path(Path::new("/tmp/x/feedcache"));
        assert_eq!(path, PathBuf::from("/tmp/x/feedcache.lock"));
    }

    #[test]
    fn test_second_acquire_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");

        let lock = CacheLock::acquire(&cache).unwrap();
        match CacheLock::acquire(&cache) {
            Err(FeedCacheError::Locked { pid, .. }) => assert_eq!(pid, std::process::id()),
            other => panic!("expected Locked, got {:?}", other),
        }

        drop(lock);
        assert!(!CacheLock::lock_path(&cache).exists());
        let _again = CacheLock::acquire(&cache).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        // PIDs are capped well below this on Linux and macOS
        fs::write(CacheLock::lock_path(&cache), "4194999\n").unwrap();

        let lock = CacheLock::acquire(&cache).unwrap();
        let owner = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
    }
}
