//! # File I/O Module
//!
//! Handles model snapshot files with safety features:
//! - **Atomic saves**: Write to .tmp, verify, rename to prevent corruption
//! - **Model locking**: Only one expansion run may edit a model at a time
//! - **Version validation**: Ensure schema compatibility
//!
//! Lock files sit next to the model file with a `.lock` extension appended
//! and record who holds the lock.
//!
//! ## Example
//!
//! ```rust,no_run
//! use split_core::file_io::{save_snapshot, load_snapshot, ModelLock};
//! use std::path::Path;
//!
//! let path = Path::new("tower.json");
//! let lock = ModelLock::acquire(path, "engineer@company.com").unwrap();
//!
//! let snapshot = load_snapshot(path).unwrap();
//! save_snapshot(&snapshot, path).unwrap();
//!
//! // Lock is released when dropped
//! drop(lock);
//! ```

#[cfg(not(target_arch = "wasm32"))]
mod lock;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{ExpandError, ExpandResult};
use crate::snapshot::{ModelSnapshot, SCHEMA_VERSION};

#[cfg(not(target_arch = "wasm32"))]
pub use lock::{LockInfo, ModelLock};

/// `model.json` -> `model.json.<suffix>`
fn with_appended_extension(path: &Path, suffix: &str) -> PathBuf {
    let mut out = path.to_path_buf();
    let extension = out
        .extension()
        .map(|e| format!("{}.{}", e.to_string_lossy(), suffix))
        .unwrap_or_else(|| suffix.to_string());
    out.set_extension(extension);
    out
}

/// Map an I/O failure on `path` to [`ExpandError::FileError`].
fn io_error<'a>(operation: &'a str, path: &'a Path) -> impl FnOnce(std::io::Error) -> ExpandError + 'a {
    move |e| ExpandError::file_error(operation, path.display().to_string(), e.to_string())
}

/// Save a snapshot with atomic write semantics (tmp file, fsync, rename).
pub fn save_snapshot(snapshot: &ModelSnapshot, path: &Path) -> ExpandResult<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp_path = with_appended_extension(path, "tmp");

    File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.sync_all()
        })
        .map_err(io_error("write temp file", &tmp_path))?;

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_error("rename to final", path)(e));
    }

    tracing::debug!("Saved snapshot to {}", path.display());
    Ok(())
}

/// Load a snapshot and check its schema version.
pub fn load_snapshot(path: &Path) -> ExpandResult<ModelSnapshot> {
    let contents = fs::read_to_string(path).map_err(io_error("read", path))?;
    let snapshot: ModelSnapshot =
        serde_json::from_str(&contents).map_err(|e| ExpandError::SerializationError {
            reason: format!("Invalid JSON in {}: {}", path.display(), e),
        })?;

    validate_version(&snapshot.meta.version)?;
    Ok(snapshot)
}

fn validate_version(file_version: &str) -> ExpandResult<()> {
    let file_parts: Vec<u32> = file_version
        .split('.')
        .filter_map(|p| p.parse().ok())
        .collect();
    let current_parts: Vec<u32> = SCHEMA_VERSION
        .split('.')
        .filter_map(|p| p.parse().ok())
        .collect();

    let mismatch = || ExpandError::VersionMismatch {
        file_version: file_version.to_string(),
        expected_version: SCHEMA_VERSION.to_string(),
    };

    if file_parts.is_empty() || current_parts.is_empty() {
        return Err(mismatch());
    }

    if file_parts[0] != current_parts[0] {
        return Err(mismatch());
    }

    // 0.x: a newer minor version may carry breaking changes
    if current_parts[0] == 0
        && file_parts.len() > 1
        && current_parts.len() > 1
        && file_parts[1] > current_parts[1]
    {
        return Err(mismatch());
    }

    Ok(())
}
