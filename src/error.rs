use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the capture, hashing and assembly pipeline.
#[derive(Debug, Error)]
pub enum ScrollshotError {
    /// User or system abort while the capture loop was running.
    #[error("scrollshot was cancelled")]
    Cancelled,

    #[error("no frames were captured")]
    NoFramesCaptured,

    #[error("unable to join scrollshot images into one image ({reason}); please scroll slowly and in one direction only")]
    StitchFailed { reason: String },

    #[error("capture provider failed: {0}")]
    CaptureProvider(String),

    #[error("invalid settings: {}", .0.join("; "))]
    InvalidSettings(Vec<String>),

    /// Two hashes produced with different `bits` were compared.
    #[error("can't compare hashes with different length ({left} vs {right})")]
    HashLengthMismatch { left: usize, right: usize },

    #[error("unsupported hash variant `{0}`")]
    UnsupportedHashVariant(String),

    #[error("`{0}` is not a hex-encoded hash")]
    InvalidHash(String),

    #[error("pixel buffer of {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidPixelBuffer {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("image joiner executable not found at {}", .0.display())]
    JoinerUnavailable(PathBuf),

    #[error("image decoding or encoding failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScrollshotError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScrollshotError::Cancelled)
    }

    pub(crate) fn stitch_failed(reason: impl Into<String>) -> Self {
        ScrollshotError::StitchFailed {
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = ScrollshotError> = std::result::Result<T, E>;
