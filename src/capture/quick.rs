use chrono::Utc;
use std::path::{Path, PathBuf};

use super::provider::{CaptureArea, CaptureProvider, DisplayTarget};
use crate::error::Result;
use crate::utils::unique_frame_path;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Single still of the area, saved straight into `dir` without dedup or a session.
pub async fn quick_capture(
    provider: &dyn CaptureProvider,
    display: &DisplayTarget,
    area: &CaptureArea,
    dir: &Path,
) -> Result<PathBuf> {
    let still = provider.capture(display, area).await?;

    tokio::fs::create_dir_all(dir).await?;
    let path = unique_frame_path(dir, &still.source_label, Utc::now());
    tokio::fs::write(&path, &still.bytes).await?;

    log_info!(
        "saved screenshot to '{}' ({}kb)",
        path.display(),
        still.bytes.len() / 1024
    );
    Ok(path)
}
