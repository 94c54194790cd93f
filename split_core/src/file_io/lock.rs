//! Advisory model locks.
//!
//! A lock is an OS-level exclusive lock (fs2) on `<model>.lock` plus a JSON
//! [`LockInfo`] body in the same file, so another user can see who holds the
//! model. The file is removed when the [`ModelLock`] is dropped.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use super::{io_error, with_appended_extension};
use crate::errors::{ExpandError, ExpandResult};

/// Locks older than this are taken over regardless of their holder
const MAX_LOCK_AGE_HOURS: i64 = 24;

/// Who holds a model lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    pub user_id: String,
    pub machine: String,
    pub pid: u32,
    pub locked_at: DateTime<Utc>,
}

impl LockInfo {
    fn current(user_id: String) -> Self {
        LockInfo {
            user_id,
            machine: machine_name(),
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }

    /// Too old, or left behind by a process that no longer runs here.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        if now - self.locked_at > Duration::hours(MAX_LOCK_AGE_HOURS) {
            return true;
        }
        self.machine == machine_name() && !process_alive(self.pid)
    }
}

fn machine_name() -> String {
    ["COMPUTERNAME", "HOSTNAME", "HOST"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(windows)]
fn process_alive(pid: u32) -> bool {
    std::process::Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH"])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
        .unwrap_or(true)
}

#[cfg(not(any(unix, windows)))]
fn process_alive(_pid: u32) -> bool {
    true
}

pub(crate) fn lock_path_for(model: &Path) -> PathBuf {
    with_appended_extension(model, "lock")
}

fn read_info(lock_path: &Path) -> Option<LockInfo> {
    let body = fs::read_to_string(lock_path).ok()?;
    serde_json::from_str(&body).ok()
}

/// Exclusive lock on a model file, released on drop.
#[derive(Debug)]
pub struct ModelLock {
    lock_path: PathBuf,
    /// Holds the OS lock
    _file: File,
    pub info: LockInfo,
}

impl ModelLock {
    /// Lock `model` for `user_id`.
    ///
    /// Fails with [`ExpandError::FileLocked`] while a live holder has it.
    pub fn acquire(model: &Path, user_id: impl Into<String>) -> ExpandResult<Self> {
        let lock_path = lock_path_for(model);
        if let Some(holder) = Self::holder(model) {
            return Err(ExpandError::file_locked(
                model.display().to_string(),
                format!("{} ({})", holder.user_id, holder.machine),
                holder.locked_at.to_rfc3339(),
            ));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(io_error("create lock", &lock_path))?;
        file.try_lock_exclusive().map_err(|_| {
            ExpandError::file_locked(model.display().to_string(), "another process", "unknown")
        })?;

        let info = LockInfo::current(user_id.into());
        file.write_all(serde_json::to_string_pretty(&info)?.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(io_error("write lock", &lock_path))?;

        tracing::debug!("Locked {} for {}", model.display(), info.user_id);
        Ok(ModelLock {
            lock_path,
            _file: file,
            info,
        })
    }

    /// Current live holder of the lock on `model`, if any.
    ///
    /// A stale lock file is reported as free and logged.
    pub fn holder(model: &Path) -> Option<LockInfo> {
        let info = read_info(&lock_path_for(model))?;
        if info.is_stale(Utc::now()) {
            tracing::warn!("Ignoring stale lock on {} held by {}", model.display(), info.user_id);
            return None;
        }
        Some(info)
    }
}

impl Drop for ModelLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}
