use std::time::Duration;

use crate::hashing::HashVariant;

/// Tunables for the capture loop.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// Hard cap on loop ticks, kept or not.
    pub max_frames: u32,

    /// Consecutive near-duplicates tolerated before the user is assumed to have stopped scrolling.
    pub max_repeated: u32,

    /// Target cadence; capture time is subtracted from it before sleeping.
    pub min_delay: Duration,

    /// Hash grid resolution. Must not change within a session.
    pub hash_bits: u32,
    pub hash_variant: HashVariant,

    /// Hamming distance above which a frame counts as new content.
    pub diff_threshold: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            max_frames: 512,
            max_repeated: 50,
            min_delay: Duration::from_millis(428),
            hash_bits: 128,
            hash_variant: HashVariant::Interpolated,
            diff_threshold: 1000,
        }
    }
}
