//! Scrolling screenshots: sample a marked screen area while the user scrolls,
//! keep only frames whose block hash moved far enough, then hand the kept
//! frames to an external joiner that stitches them into one tall image.

pub mod capture;
pub mod error;
pub mod hashing;
pub mod models;
pub mod scrollshot;
pub mod settings;
pub mod utils;

pub use capture::{
    quick_capture, CaptureArea, CaptureProvider, CaptureRequest, CaptureSettings, DisplayTarget,
    ReplayCaptureProvider,
};
pub use error::{Result, ScrollshotError};
pub use hashing::{distance, hash, BlockHash, HashVariant, PixelBuffer};
pub use models::{ScrollshotSession, SessionStatus};
pub use scrollshot::{
    run_scrollshot, ChatJoiner, ImageJoiner, JoinRequest, ScrollshotController, ScrollshotJob,
};
pub use settings::{ScrollshotPaths, SettingsStore, StitchSettings};
