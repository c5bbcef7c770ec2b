use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Capturing,
    Assembling,
    Completed,
    Cancelled,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Capturing => "Capturing",
            SessionStatus::Assembling => "Assembling",
            SessionStatus::Completed => "Completed",
            SessionStatus::Cancelled => "Cancelled",
            SessionStatus::Failed => "Failed",
        }
    }
}

/// One scrollshot from the moment the area is marked until the composite exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollshotSession {
    /// Milliseconds since the epoch at creation; doubles as the frame directory name.
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub frames_dir: PathBuf,
    /// Kept frames in capture order.
    pub kept_frames: Vec<PathBuf>,
    pub composite_path: Option<PathBuf>,
    pub status: SessionStatus,
}

impl ScrollshotSession {
    pub fn begin(frames_root: &Path) -> Self {
        Self::begin_at(frames_root, Utc::now())
    }

    pub fn begin_at(frames_root: &Path, started_at: DateTime<Utc>) -> Self {
        let id = started_at.timestamp_millis();
        Self {
            id,
            started_at,
            frames_dir: frames_root.join(id.to_string()),
            kept_frames: Vec::new(),
            composite_path: None,
            status: SessionStatus::Capturing,
        }
    }

    pub fn kept_count(&self) -> usize {
        self.kept_frames.len()
    }

    pub fn last_kept_path(&self) -> Option<&Path> {
        self.kept_frames.last().map(PathBuf::as_path)
    }
}
