use std::path::{Path, PathBuf};

use super::joiner::{ImageJoiner, JoinRequest};
use crate::error::{Result, ScrollshotError};
use crate::models::{ScrollshotSession, SessionStatus};
use crate::settings::StitchSettings;
use crate::utils::TempDirGuard;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const RESULT_FILE_NAME: &str = "result.png";

/// Directory the composite for `session` is written to.
pub fn output_dir(output_root: &Path, session: &ScrollshotSession) -> PathBuf {
    output_root.join(session.id.to_string()).join("output")
}

/// Turns the kept frames of a finished capture into the final image.
///
/// A single frame is returned as-is and the joiner is only spawned for two or
/// more. When the joiner runs, the frames directory is removed afterwards
/// whatever the result.
pub async fn finish(
    session: &mut ScrollshotSession,
    stitch: &StitchSettings,
    joiner: &dyn ImageJoiner,
    output_root: &Path,
) -> Result<PathBuf> {
    let result = assemble(session, stitch, joiner, output_root).await;

    match &result {
        Ok(path) => {
            session.status = SessionStatus::Completed;
            session.composite_path = Some(path.clone());
            log_info!("scrollshot {} saved to {}", session.id, path.display());
        }
        Err(err) => {
            session.status = SessionStatus::Failed;
            log_warn!("scrollshot {} failed: {err}", session.id);
        }
    }
    result
}

async fn assemble(
    session: &mut ScrollshotSession,
    stitch: &StitchSettings,
    joiner: &dyn ImageJoiner,
    output_root: &Path,
) -> Result<PathBuf> {
    if session.kept_count() == 0 {
        TempDirGuard::new(&session.frames_dir).remove().await;
        return Err(ScrollshotError::NoFramesCaptured);
    }

    if session.kept_count() == 1 {
        if let Some(only) = session.last_kept_path() {
            log_info!("only one frame kept, skipping the joiner");
            return Ok(only.to_path_buf());
        }
    }

    let frames = TempDirGuard::new(&session.frames_dir);
    let joined = join_frames(session, stitch, joiner, output_root).await;
    frames.remove().await;
    joined
}

async fn join_frames(
    session: &mut ScrollshotSession,
    stitch: &StitchSettings,
    joiner: &dyn ImageJoiner,
    output_root: &Path,
) -> Result<PathBuf> {
    stitch.validate()?;
    session.status = SessionStatus::Assembling;

    let out_dir = output_dir(output_root, session);
    tokio::fs::create_dir_all(&out_dir).await?;
    let request = JoinRequest {
        frames_dir: session.frames_dir.clone(),
        output_path: out_dir.join(RESULT_FILE_NAME),
        settings: stitch.clone(),
    };

    log_info!(
        "joining {} frames from {}",
        session.kept_count(),
        request.frames_dir.display()
    );
    joiner.join(&request).await?;

    if !tokio::fs::try_exists(&request.output_path).await? {
        return Err(ScrollshotError::stitch_failed(
            "joiner finished without writing an image",
        ));
    }
    Ok(request.output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingJoiner {
        calls: Mutex<Vec<JoinRequest>>,
        fail: bool,
        skip_output: bool,
    }

    #[async_trait]
    impl ImageJoiner for RecordingJoiner {
        async fn join(&self, request: &JoinRequest) -> Result<()> {
            self.calls.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(ScrollshotError::stitch_failed("exit status: 1"));
            }
            if !self.skip_output {
                std::fs::write(&request.output_path, b"png").unwrap();
            }
            Ok(())
        }
    }

    impl RecordingJoiner {
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    fn session_with_frames(root: &Path, count: usize) -> ScrollshotSession {
        let mut session = ScrollshotSession::begin(&root.join("frames"));
        std::fs::create_dir_all(&session.frames_dir).unwrap();
        for i in 0..count {
            let path = session.frames_dir.join(format!("Screen.{i}.jpg"));
            std::fs::write(&path, b"jpg").unwrap();
            session.kept_frames.push(path);
        }
        session
    }

    #[tokio::test]
    async fn no_frames_is_an_error_without_joining() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_with_frames(root.path(), 0);
        let joiner = RecordingJoiner::default();

        let err = finish(&mut session, &StitchSettings::default(), &joiner, root.path())
            .await
            .unwrap_err();

        assert!(matches!(err, ScrollshotError::NoFramesCaptured));
        assert_eq!(joiner.call_count(), 0);
        assert_eq!(session.status, SessionStatus::Failed);
        assert!(!session.frames_dir.exists());
    }

    #[tokio::test]
    async fn single_frame_is_returned_as_is() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_with_frames(root.path(), 1);
        let only = session.kept_frames[0].clone();
        let joiner = RecordingJoiner::default();

        let path = finish(&mut session, &StitchSettings::default(), &joiner, root.path())
            .await
            .unwrap();

        assert_eq!(path, only);
        assert!(path.exists());
        assert_eq!(joiner.call_count(), 0);
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.composite_path.as_deref(), Some(only.as_path()));
    }

    #[tokio::test]
    async fn many_frames_are_joined_and_cleaned_up() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_with_frames(root.path(), 3);
        let frames_dir = session.frames_dir.clone();
        let joiner = RecordingJoiner::default();

        let path = finish(&mut session, &StitchSettings::default(), &joiner, root.path())
            .await
            .unwrap();

        assert_eq!(
            path,
            root.path()
                .join(session.id.to_string())
                .join("output")
                .join(RESULT_FILE_NAME)
        );
        assert!(path.exists());
        assert!(!frames_dir.exists());

        let calls = joiner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].frames_dir, frames_dir);
    }

    #[tokio::test]
    async fn failed_join_still_removes_frames() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_with_frames(root.path(), 2);
        let joiner = RecordingJoiner {
            fail: true,
            ..Default::default()
        };

        let err = finish(&mut session, &StitchSettings::default(), &joiner, root.path())
            .await
            .unwrap_err();

        assert!(matches!(err, ScrollshotError::StitchFailed { .. }));
        assert!(!session.frames_dir.exists());
        assert_eq!(session.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn missing_output_is_a_stitch_failure() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_with_frames(root.path(), 2);
        let joiner = RecordingJoiner {
            skip_output: true,
            ..Default::default()
        };

        let err = finish(&mut session, &StitchSettings::default(), &joiner, root.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("one direction only"));
    }

    #[tokio::test]
    async fn invalid_settings_are_rejected_before_joining() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_with_frames(root.path(), 2);
        let joiner = RecordingJoiner::default();
        let stitch = StitchSettings {
            denoising_factor: 1.5,
            ..StitchSettings::default()
        };

        let err = finish(&mut session, &stitch, &joiner, root.path())
            .await
            .unwrap_err();

        assert!(matches!(err, ScrollshotError::InvalidSettings(ref fields) if fields.len() == 1));
        assert_eq!(joiner.call_count(), 0);
        assert!(!session.frames_dir.exists());
    }
}
