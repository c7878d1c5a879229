//! A cooperative, file-backed advisory lock around the store file (SPEC_FULL.md §4.2).
//!
//! Two layers cooperate: `fs2`'s OS-level `flock` on the sidecar `<store>.lock`
//! file prevents two processes from both believing they created it, and a
//! JSON timestamp written inside that file lets a contender recognize and
//! forcibly reclaim a lock whose holder has stopped refreshing it — a case
//! OS `flock` alone cannot distinguish from "still working".

use crate::config::{
    LOCK_BACKOFF_FACTOR, LOCK_BACKOFF_MAX_MS, LOCK_BACKOFF_MIN_MS, LOCK_MAX_RETRIES,
    LOCK_STALE_TIMEOUT_MS,
};
use crate::errors::MemoryError;
use anyhow::Result;
use fs2::FileExt;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct LockMeta {
    writer_id: String,
    refreshed_at_ms: i64,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn lock_path_for(store_path: &Path) -> PathBuf {
    let file_name = store_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "store".to_string());
    store_path.with_file_name(format!("{file_name}.lock"))
}

/// A held lock on a store file. Dropping it releases the OS-level flock; the
/// sidecar file itself is left in place so the next acquirer's `flock` call
/// is what determines ownership, not the file's mere existence.
pub struct FileLock {
    path: PathBuf,
    file: File,
    writer_id: String,
}

impl FileLock {
    /// Acquire the lock for `store_path`, retrying with exponential backoff
    /// and forcibly reclaiming a stale lock when one is found.
    pub fn acquire(store_path: &Path) -> Result<Self> {
        let lock_path = lock_path_for(store_path);
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer_id = crate::store::new_writer_id();

        let mut wait_ms = LOCK_BACKOFF_MIN_MS;
        for attempt in 1..=LOCK_MAX_RETRIES {
            match try_acquire_once(&lock_path, &writer_id) {
                Ok(file) => {
                    debug!("acquired lock {} as {writer_id}", lock_path.display());
                    return Ok(FileLock {
                        path: lock_path,
                        file,
                        writer_id,
                    });
                }
                Err(_) if is_stale(&lock_path) => {
                    if let Ok(file) = force_claim(&lock_path, &writer_id) {
                        warn!(
                            "reclaimed stale lock {} as {writer_id}",
                            lock_path.display()
                        );
                        return Ok(FileLock {
                            path: lock_path,
                            file,
                            writer_id,
                        });
                    }
                }
                Err(_) => {}
            }

            if attempt == LOCK_MAX_RETRIES {
                break;
            }
            thread::sleep(Duration::from_millis(wait_ms));
            wait_ms = (wait_ms * LOCK_BACKOFF_FACTOR).min(LOCK_BACKOFF_MAX_MS);
        }

        Err(MemoryError::LockAcquisitionFailed {
            path: store_path.display().to_string(),
        }
        .into())
    }

    /// Refresh the liveness timestamp. Callers holding the lock across a
    /// slow critical section should call this more often than
    /// [`crate::config::LOCK_REFRESH_INTERVAL_MS`].
    pub fn touch(&mut self) -> Result<()> {
        write_meta(&mut self.file, &self.writer_id)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!("released lock {} ({})", self.path.display(), self.writer_id);
    }
}

fn try_acquire_once(lock_path: &Path, writer_id: &str) -> Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .read(true)
        .open(lock_path)?;
    file.try_lock_exclusive()?;
    write_meta(&mut file, writer_id)?;
    Ok(file)
}

fn write_meta(file: &mut File, writer_id: &str) -> Result<()> {
    use std::io::{Seek, SeekFrom, Write};
    let meta = LockMeta {
        writer_id: writer_id.to_string(),
        refreshed_at_ms: now_ms(),
    };
    let body = serde_json::to_vec(&meta)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&body)?;
    file.sync_all().ok();
    Ok(())
}

fn read_meta(lock_path: &Path) -> Option<LockMeta> {
    let bytes = std::fs::read(lock_path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// A lock is stale once its holder has gone longer than the stale timeout
/// without refreshing. A lock file with no parseable metadata (e.g. freshly
/// created and empty, or left over from an incompatible version) is treated
/// as stale too, since there is nothing indicating a live holder.
fn is_stale(lock_path: &Path) -> bool {
    match read_meta(lock_path) {
        Some(meta) => now_ms() - meta.refreshed_at_ms > LOCK_STALE_TIMEOUT_MS as i64,
        None => lock_path.exists(),
    }
}

/// Force-claim a lock believed stale. Unlinking and recreating the sidecar
/// file gives us a brand new inode, so our `flock` on it succeeds
/// independently of whatever file descriptor the previous (hung) holder has
/// open on the old inode.
fn force_claim(lock_path: &Path, writer_id: &str) -> Result<File> {
    let _ = std::fs::remove_file(lock_path);
    try_acquire_once(lock_path, writer_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn healthy_lock_is_not_stale() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("memory.jsonl.lock");
        let _file = try_acquire_once(&lock_path, "writer-0").unwrap();
        assert!(!is_stale(&lock_path));
    }

    #[test]
    fn stale_lock_is_forcibly_reclaimed() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("memory.jsonl");
        let lock_path = lock_path_for(&store_path);

        // A holder acquires the lock, then stops refreshing it (crashes,
        // hangs, whatever) without ever releasing the OS-level flock.
        let holder_file = try_acquire_once(&lock_path, "holder-0").unwrap();
        let stale_meta = LockMeta {
            writer_id: "holder-0".to_string(),
            refreshed_at_ms: now_ms() - LOCK_STALE_TIMEOUT_MS as i64 - 1_000,
        };
        std::fs::write(&lock_path, serde_json::to_vec(&stale_meta).unwrap()).unwrap();
        assert!(is_stale(&lock_path));

        // A contender should notice the lock is stale and reclaim it even
        // though `holder_file`'s flock was never released.
        let reclaimed =
            FileLock::acquire(&store_path).expect("a stale lock should be reclaimable");
        assert_ne!(reclaimed.writer_id, "holder-0");

        drop(holder_file);
    }
}
