use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Removes a directory tree when dropped unless [`TempDirGuard::keep`] was called.
///
/// Held across the joiner call so the per-frame files go away on success,
/// on a failed exit status, on an early `?` return and on task abort alike.
#[derive(Debug)]
pub struct TempDirGuard {
    path: PathBuf,
    armed: bool,
}

impl TempDirGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory on the blocking pool and disarms the guard.
    pub async fn remove(mut self) {
        self.armed = false;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => log_debug!("removed temporary directory {}", self.path.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => log_warn!(
                "failed to remove temporary directory {}: {err}",
                self.path.display()
            ),
        }
    }

    /// Leave the directory on disk.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if !self.armed || !self.path.exists() {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => log_debug!("removed temporary directory {}", self.path.display()),
            Err(err) => log_warn!(
                "failed to remove temporary directory {}: {err}",
                self.path.display()
            ),
        }
    }
}

/// ISO 8601 timestamp without colons, usable in file names on every platform.
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H%M%S%.6fZ").to_string()
}

/// Frame file name `<label>.<timestamp>.jpg` with path separators stripped from the label.
pub fn frame_file_name(source_label: &str, at: DateTime<Utc>) -> String {
    let label: String = source_label
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    let label = if label.is_empty() { "screen".to_string() } else { label };
    format!("{label}.{}.jpg", file_timestamp(at))
}

/// First free frame path in `dir`, nudging the timestamp forward on collision
/// so name order stays capture order.
pub fn unique_frame_path(dir: &Path, source_label: &str, at: DateTime<Utc>) -> PathBuf {
    let mut at = at;
    loop {
        let candidate = dir.join(frame_file_name(source_label, at));
        if !candidate.exists() {
            return candidate;
        }
        at += Duration::microseconds(1);
    }
}
