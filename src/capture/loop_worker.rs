use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::config::CaptureSettings;
use super::provider::{CaptureArea, CaptureFrame, CaptureProvider, DisplayTarget};
use super::state::{LoopState, StopReason, TickDecision};
use crate::error::{Result, ScrollshotError};
use crate::hashing::{self, BlockHash};
use crate::models::ScrollshotSession;
use crate::utils::unique_frame_path;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Where to capture: the display the area was marked on and the area itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub display: DisplayTarget,
    pub area: CaptureArea,
}

/// How a capture loop ended. The full list of kept frames is on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub frames_dir: PathBuf,
    pub last_kept_path: Option<PathBuf>,
    pub stop_reason: StopReason,
    pub ticks: u32,
    pub kept_count: u32,
    pub repeated_count: u32,
}

/// Samples the area until the frame cap, the repeat cap or the user's done
/// signal, persisting only frames that differ enough from the last kept one.
///
/// Returns [`ScrollshotError::Cancelled`] when `cancel_token` fires; the frame
/// in flight at that moment is never written.
pub async fn run_capture_loop(
    session: &mut ScrollshotSession,
    request: &CaptureRequest,
    provider: &dyn CaptureProvider,
    settings: &CaptureSettings,
    done_rx: &watch::Receiver<bool>,
    cancel_token: &CancellationToken,
) -> Result<CaptureOutcome> {
    let mut state = LoopState::new();
    state.begin();

    log_info!(
        "scrollshot {} capturing {} on display {} (max {} frames, threshold {})",
        session.id,
        request.area,
        request.display.id,
        settings.max_frames,
        settings.diff_threshold
    );

    let result = drive(
        &mut state,
        session,
        request,
        provider,
        settings,
        done_rx,
        cancel_token,
    )
    .await;

    match &result {
        Ok(outcome) => log_info!(
            "scrollshot {} stopped ({:?}) after {} ticks: {} kept, {} repeated",
            session.id,
            outcome.stop_reason,
            outcome.ticks,
            outcome.kept_count,
            outcome.repeated_count
        ),
        Err(ScrollshotError::Cancelled) => {
            state.cancel();
            log_info!("scrollshot {} cancelled after {} ticks", session.id, state.ticks);
        }
        Err(err) => {
            state.fail();
            log_warn!("scrollshot {} capture failed: {err}", session.id);
        }
    }

    result
}

async fn drive(
    state: &mut LoopState,
    session: &mut ScrollshotSession,
    request: &CaptureRequest,
    provider: &dyn CaptureProvider,
    settings: &CaptureSettings,
    done_rx: &watch::Receiver<bool>,
    cancel_token: &CancellationToken,
) -> Result<CaptureOutcome> {
    let stop_reason = loop {
        if state.reached_frame_limit(settings) {
            state.stop(StopReason::FrameLimit);
            break StopReason::FrameLimit;
        }
        if cancel_token.is_cancelled() {
            return Err(ScrollshotError::Cancelled);
        }

        let tick_start = Instant::now();
        state.ticks += 1;

        let (frame, hash) = acquire_frame(provider, request, settings).await?;
        let distance = match &state.last_hash {
            Some(previous) => Some(hashing::distance(&hash, previous)?),
            None => None,
        };

        if cancel_token.is_cancelled() {
            return Err(ScrollshotError::Cancelled);
        }
        state.done = state.done || *done_rx.borrow();

        match state.decide(distance, settings) {
            TickDecision::Stop(reason) => {
                state.stop(reason);
                break reason;
            }
            TickDecision::Keep => {
                let path = persist_frame(&session.frames_dir, &frame).await?;
                log_info!(
                    "kept frame {}: {}kb, {}x{}, distance {:?}, tick took {}ms",
                    state.kept_count + 1,
                    frame.size_kb(),
                    frame.pixels.width(),
                    frame.pixels.height(),
                    distance,
                    tick_start.elapsed().as_millis()
                );
                session.kept_frames.push(path);
                state.record_kept(hash);
            }
            TickDecision::Discard => {
                state.record_repeated();
                log_debug!(
                    "discarded near-duplicate frame (distance {:?}, streak {})",
                    distance,
                    state.repeated_count
                );
            }
        }

        // The last allowed tick ends without pacing.
        if !state.reached_frame_limit(settings) {
            let delay = settings.min_delay.saturating_sub(tick_start.elapsed());
            pace(delay, cancel_token).await;
        }
    };

    Ok(CaptureOutcome {
        frames_dir: session.frames_dir.clone(),
        last_kept_path: session.kept_frames.last().cloned(),
        stop_reason,
        ticks: state.ticks,
        kept_count: state.kept_count,
        repeated_count: state.repeated_count,
    })
}

/// Captures one still and decodes and hashes it on a blocking worker.
async fn acquire_frame(
    provider: &dyn CaptureProvider,
    request: &CaptureRequest,
    settings: &CaptureSettings,
) -> Result<(CaptureFrame, BlockHash)> {
    let still = provider.capture(&request.display, &request.area).await?;

    let bits = settings.hash_bits;
    let variant = settings.hash_variant;
    tokio::task::spawn_blocking(move || -> Result<(CaptureFrame, BlockHash)> {
        let frame = CaptureFrame::decode(still)?;
        let hash = hashing::hash(&frame.pixels, bits, variant);
        Ok((frame, hash))
    })
    .await
    .map_err(|err| ScrollshotError::Io(std::io::Error::other(err)))?
}

async fn persist_frame(dir: &Path, frame: &CaptureFrame) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = unique_frame_path(dir, &frame.source_label, Utc::now());
    tokio::fs::write(&path, &frame.bytes).await?;
    log_debug!("saved frame to {}", path.display());
    Ok(path)
}

/// Sleeps out the rest of the tick; wakes early on cancellation.
async fn pace(delay: Duration, cancel_token: &CancellationToken) {
    if delay.is_zero() {
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = cancel_token.cancelled() => {}
    }
}
