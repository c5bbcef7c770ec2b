use async_trait::async_trait;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use super::provider::{
    encode_area, find_source_by_display, CaptureArea, CaptureProvider, CapturedStill,
    DisplaySource, DisplayTarget,
};
use crate::error::{Result, ScrollshotError};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Plays back a directory of full-display stills as if they were live captures.
///
/// Files are served in name order; once exhausted the last still repeats, which
/// looks to the capture loop like the user has stopped scrolling.
pub struct ReplayCaptureProvider {
    sources: Vec<DisplaySource<Vec<PathBuf>>>,
    cursor: AtomicUsize,
}

impl ReplayCaptureProvider {
    pub fn from_dir(dir: &Path, display_id: impl Into<String>) -> Result<Self> {
        let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(ScrollshotError::CaptureProvider(format!(
                "no images to replay in {}",
                dir.display()
            )));
        }

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Replay".to_string());

        Ok(Self {
            sources: vec![DisplaySource {
                display_id: display_id.into(),
                name,
                content: frames,
            }],
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn frame_count(&self) -> usize {
        self.sources.iter().map(|s| s.content.len()).sum()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl CaptureProvider for ReplayCaptureProvider {
    async fn capture(&self, display: &DisplayTarget, area: &CaptureArea) -> Result<CapturedStill> {
        let source = find_source_by_display(&self.sources, display)?;
        let index = self
            .cursor
            .fetch_add(1, Ordering::Relaxed)
            .min(source.content.len() - 1);
        let path = source.content[index].clone();
        let area = *area;

        let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let full = image::open(&path)?;
            encode_area(&full, &area)
        })
        .await
        .map_err(|err| ScrollshotError::CaptureProvider(format!("replay worker failed: {err}")))??;

        Ok(CapturedStill {
            bytes,
            source_label: source.name.clone(),
        })
    }
}
