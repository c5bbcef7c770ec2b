use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scrollshot_lib::capture::CapturedStill;
use scrollshot_lib::{
    CaptureArea, CaptureProvider, CaptureRequest, CaptureSettings, DisplayTarget, HashVariant,
    ImageJoiner, JoinRequest, Result, ScrollshotController, ScrollshotError, ScrollshotJob,
    ScrollshotPaths, StitchSettings,
};

fn striped_jpeg(shift: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(64, 64, |_x, y| {
        if ((y + shift) / 8) % 2 == 0 {
            Rgb([20, 20, 20])
        } else {
            Rgb([235, 235, 235])
        }
    });
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 100)
        .encode_image(&img)
        .unwrap();
    bytes
}

/// Serves the scripted stills in order, then repeats the last one forever.
struct ScriptedProvider {
    stills: Vec<Vec<u8>>,
    served: Mutex<usize>,
}

impl ScriptedProvider {
    fn new(shifts: &[u32]) -> Self {
        Self {
            stills: shifts.iter().map(|s| striped_jpeg(*s)).collect(),
            served: Mutex::new(0),
        }
    }
}

#[async_trait]
impl CaptureProvider for ScriptedProvider {
    async fn capture(&self, _display: &DisplayTarget, _area: &CaptureArea) -> Result<CapturedStill> {
        let mut served = self.served.lock().unwrap();
        let index = (*served).min(self.stills.len() - 1);
        *served += 1;
        Ok(CapturedStill {
            bytes: self.stills[index].clone(),
            source_label: "Entire Screen".into(),
        })
    }
}

#[derive(Default)]
struct RecordingJoiner {
    calls: Mutex<Vec<(JoinRequest, usize)>>,
}

#[async_trait]
impl ImageJoiner for RecordingJoiner {
    async fn join(&self, request: &JoinRequest) -> Result<()> {
        let frames = std::fs::read_dir(&request.frames_dir)?.count();
        self.calls.lock().unwrap().push((request.clone(), frames));
        std::fs::write(&request.output_path, b"png")?;
        Ok(())
    }
}

fn job(root: &Path, capture: CaptureSettings) -> ScrollshotJob {
    ScrollshotJob {
        request: CaptureRequest {
            display: DisplayTarget::new("1", 0),
            area: CaptureArea::new(0, 0, 64, 64),
        },
        capture,
        stitch: StitchSettings::default(),
        paths: ScrollshotPaths::under(root),
    }
}

fn capture_settings() -> CaptureSettings {
    CaptureSettings {
        max_frames: 200,
        max_repeated: 5,
        min_delay: Duration::from_millis(1),
        hash_bits: 16,
        hash_variant: HashVariant::Interpolated,
        diff_threshold: 20,
    }
}

fn is_empty_or_missing(dir: &Path) -> bool {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

#[tokio::test]
async fn scroll_then_settle_produces_joined_image() {
    let root = tempfile::tempdir().unwrap();
    let paths = ScrollshotPaths::under(root.path());
    let joiner = Arc::new(RecordingJoiner::default());

    let mut controller = ScrollshotController::new();
    controller
        .start(
            job(root.path(), capture_settings()),
            Arc::new(ScriptedProvider::new(&[0, 0, 8, 8, 0])),
            joiner.clone(),
        )
        .unwrap();

    let path = controller.wait().await.unwrap().expect("not cancelled");
    assert!(path.starts_with(&paths.output_root));
    assert!(path.ends_with(Path::new("output").join("result.png")));
    assert_eq!(std::fs::read(&path).unwrap(), b"png");

    let calls = joiner.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    // Three content changes: 0, then 8, then back to 0.
    assert_eq!(calls[0].1, 3);
    assert!(is_empty_or_missing(&paths.frames_root));
    assert!(!controller.is_active());
}

#[tokio::test]
async fn still_area_yields_the_single_frame() {
    let root = tempfile::tempdir().unwrap();
    let paths = ScrollshotPaths::under(root.path());
    let joiner = Arc::new(RecordingJoiner::default());

    let mut controller = ScrollshotController::new();
    controller
        .start(
            job(root.path(), capture_settings()),
            Arc::new(ScriptedProvider::new(&[0])),
            joiner.clone(),
        )
        .unwrap();

    let path = controller.wait().await.unwrap().expect("not cancelled");
    assert!(path.starts_with(&paths.frames_root));
    assert!(path.exists());
    assert!(joiner.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn only_one_scrollshot_at_a_time() {
    let root = tempfile::tempdir().unwrap();
    let slow = CaptureSettings {
        max_repeated: 10_000,
        min_delay: Duration::from_millis(10),
        ..capture_settings()
    };

    let mut controller = ScrollshotController::new();
    controller
        .start(
            job(root.path(), slow.clone()),
            Arc::new(ScriptedProvider::new(&[0])),
            Arc::new(RecordingJoiner::default()),
        )
        .unwrap();

    let err = controller
        .start(
            job(root.path(), slow),
            Arc::new(ScriptedProvider::new(&[0])),
            Arc::new(RecordingJoiner::default()),
        )
        .unwrap_err();
    assert!(err.to_string().contains("already active"));

    controller.cancel();
    assert_eq!(controller.wait().await.unwrap(), None);
}

#[tokio::test]
async fn waiting_without_a_scrollshot_is_an_error() {
    let mut controller = ScrollshotController::new();
    let err = controller.wait().await.unwrap_err();
    assert!(err.to_string().contains("no scrollshot active"));
}

#[tokio::test]
async fn collected_scrollshot_cannot_be_waited_on_twice() {
    let root = tempfile::tempdir().unwrap();
    let mut controller = ScrollshotController::new();
    controller
        .start(
            job(root.path(), capture_settings()),
            Arc::new(ScriptedProvider::new(&[0])),
            Arc::new(RecordingJoiner::default()),
        )
        .unwrap();

    assert!(controller.wait().await.unwrap().is_some());
    assert!(controller.wait().await.is_err());
}

#[tokio::test]
async fn done_signal_assembles_what_was_kept() {
    let root = tempfile::tempdir().unwrap();
    let joiner = Arc::new(RecordingJoiner::default());
    let settings = CaptureSettings {
        max_frames: 10_000,
        max_repeated: 10_000,
        min_delay: Duration::from_millis(5),
        ..capture_settings()
    };

    let mut controller = ScrollshotController::new();
    controller
        .start(
            job(root.path(), settings),
            Arc::new(ScriptedProvider::new(&[0, 8])),
            joiner.clone(),
        )
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.finish_capture();

    let path = controller.wait().await.unwrap().expect("not cancelled");
    assert!(path.ends_with("result.png"));
    assert_eq!(joiner.calls.lock().unwrap()[0].1, 2);
}

#[tokio::test]
async fn cancel_discards_everything() {
    let root = tempfile::tempdir().unwrap();
    let paths = ScrollshotPaths::under(root.path());
    let joiner = Arc::new(RecordingJoiner::default());
    let settings = CaptureSettings {
        max_frames: 10_000,
        max_repeated: 10_000,
        min_delay: Duration::from_millis(5),
        ..capture_settings()
    };

    let mut controller = ScrollshotController::new();
    controller
        .start(
            job(root.path(), settings),
            Arc::new(ScriptedProvider::new(&[0, 8, 0, 8, 0])),
            joiner.clone(),
        )
        .unwrap();

    let signals = controller.signals().unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    signals.cancel();

    assert_eq!(controller.wait().await.unwrap(), None);
    assert!(joiner.calls.lock().unwrap().is_empty());
    assert!(is_empty_or_missing(&paths.frames_root));
    assert!(is_empty_or_missing(&paths.output_root));
}

#[tokio::test]
async fn invalid_stitch_settings_fail_after_capture() {
    let root = tempfile::tempdir().unwrap();
    let joiner = Arc::new(RecordingJoiner::default());
    let mut job = job(root.path(), capture_settings());
    job.stitch.denoising_factor = 1.5;

    let mut controller = ScrollshotController::new();
    controller
        .start(job, Arc::new(ScriptedProvider::new(&[0, 8])), joiner.clone())
        .unwrap();

    let err = controller.wait().await.unwrap_err();
    let err = err.downcast::<ScrollshotError>().unwrap();
    assert!(matches!(err, ScrollshotError::InvalidSettings(_)));
    assert!(joiner.calls.lock().unwrap().is_empty());
}
