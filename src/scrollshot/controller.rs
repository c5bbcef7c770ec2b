use anyhow::{bail, Context};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::joiner::ImageJoiner;
use super::session::finish;
use crate::capture::{run_capture_loop, CaptureProvider, CaptureRequest, CaptureSettings};
use crate::error::{Result, ScrollshotError};
use crate::models::ScrollshotSession;
use crate::settings::{ScrollshotPaths, StitchSettings};
use crate::utils::TempDirGuard;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Everything one scrollshot needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ScrollshotJob {
    pub request: CaptureRequest,
    pub capture: CaptureSettings,
    pub stitch: StitchSettings,
    pub paths: ScrollshotPaths,
}

/// Signals for a running scrollshot, usable from other tasks (e.g. a Ctrl-C handler).
#[derive(Debug, Clone)]
pub struct ScrollshotSignals {
    done_tx: Arc<watch::Sender<bool>>,
    cancel_token: CancellationToken,
}

impl ScrollshotSignals {
    /// Stop capturing after the frame in flight and assemble what was kept.
    pub fn finish_capture(&self) {
        let _ = self.done_tx.send(true);
        log_info!("done signal sent to capture loop");
    }

    /// Abort the capture; nothing is assembled.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
        log_info!("cancel signal sent to capture loop");
    }
}

/// Owns the background task of the single active scrollshot.
pub struct ScrollshotController {
    handle: Option<JoinHandle<Result<PathBuf>>>,
    signals: Option<ScrollshotSignals>,
}

impl Default for ScrollshotController {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollshotController {
    pub fn new() -> Self {
        Self {
            handle: None,
            signals: None,
        }
    }

    pub fn start(
        &mut self,
        job: ScrollshotJob,
        provider: Arc<dyn CaptureProvider>,
        joiner: Arc<dyn ImageJoiner>,
    ) -> anyhow::Result<()> {
        if self.is_active() {
            bail!("scrollshot already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        // false while capturing, true once the user says they are done scrolling
        let (done_tx, done_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            run_scrollshot(job, provider.as_ref(), joiner.as_ref(), done_rx, token_clone).await
        });

        self.handle = Some(handle);
        self.signals = Some(ScrollshotSignals {
            done_tx: Arc::new(done_tx),
            cancel_token,
        });
        Ok(())
    }

    /// True while a started scrollshot has not been collected with [`Self::wait`].
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn signals(&self) -> Option<ScrollshotSignals> {
        self.signals.clone()
    }

    pub fn finish_capture(&self) {
        if let Some(signals) = &self.signals {
            signals.finish_capture();
        }
    }

    pub fn cancel(&self) {
        if let Some(signals) = &self.signals {
            signals.cancel();
        }
    }

    /// Waits for the active scrollshot. `Ok(None)` means it was cancelled;
    /// calling this with nothing started is an error.
    pub async fn wait(&mut self) -> anyhow::Result<Option<PathBuf>> {
        let Some(handle) = self.handle.take() else {
            bail!("no scrollshot active");
        };
        self.signals = None;

        match handle.await.context("scrollshot task failed to join")? {
            Ok(path) => Ok(Some(path)),
            Err(ScrollshotError::Cancelled) => {
                log_info!("scrollshot cancelled by user");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Capture then assemble, start to finish, in the current task.
pub async fn run_scrollshot(
    job: ScrollshotJob,
    provider: &dyn CaptureProvider,
    joiner: &dyn ImageJoiner,
    done_rx: watch::Receiver<bool>,
    cancel_token: CancellationToken,
) -> Result<PathBuf> {
    let mut session = ScrollshotSession::begin(&job.paths.frames_root);
    let frames = TempDirGuard::new(&session.frames_dir);

    if let Err(err) = run_capture_loop(
        &mut session,
        &job.request,
        provider,
        &job.capture,
        &done_rx,
        &cancel_token,
    )
    .await
    {
        frames.remove().await;
        return Err(err);
    }

    // From here on the session decides what happens to the frames directory.
    frames.keep();
    finish(&mut session, &job.stitch, joiner, &job.paths.output_root).await
}
