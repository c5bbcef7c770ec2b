use serde::{Deserialize, Serialize};

use super::config::CaptureSettings;
use crate::hashing::BlockHash;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    FrameLimit,
    UserSignal,
    RepeatedLimit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum LoopStatus {
    #[default]
    Idle,
    Running,
    Stopped(StopReason),
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    Keep,
    Discard,
    Stop(StopReason),
}

/// Dedup bookkeeping owned by a single loop run.
#[derive(Debug, Clone, Default)]
pub struct LoopState {
    pub status: LoopStatus,
    pub ticks: u32,
    pub kept_count: u32,
    /// Current streak of near-duplicates since the last kept frame.
    pub repeated_count: u32,
    /// Hash of the most recently kept frame.
    pub last_hash: Option<BlockHash>,
    pub done: bool,
}

impl LoopState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        *self = Self {
            status: LoopStatus::Running,
            ..Self::default()
        };
    }

    pub fn reached_frame_limit(&self, settings: &CaptureSettings) -> bool {
        self.ticks >= settings.max_frames
    }

    /// What to do with a freshly hashed frame `distance` bits away from the last kept one.
    pub fn decide(&self, distance: Option<u32>, settings: &CaptureSettings) -> TickDecision {
        if self.done {
            return TickDecision::Stop(StopReason::UserSignal);
        }
        if self.repeated_count > settings.max_repeated {
            return TickDecision::Stop(StopReason::RepeatedLimit);
        }
        match (&self.last_hash, distance) {
            (None, _) => TickDecision::Keep,
            (Some(_), Some(d)) if d > settings.diff_threshold => TickDecision::Keep,
            _ => TickDecision::Discard,
        }
    }

    pub fn record_kept(&mut self, hash: BlockHash) {
        self.kept_count += 1;
        self.repeated_count = 0;
        self.last_hash = Some(hash);
    }

    pub fn record_repeated(&mut self) {
        self.repeated_count += 1;
    }

    pub fn stop(&mut self, reason: StopReason) {
        self.status = LoopStatus::Stopped(reason);
    }

    pub fn cancel(&mut self) {
        self.status = LoopStatus::Cancelled;
    }

    pub fn fail(&mut self) {
        self.status = LoopStatus::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CaptureSettings {
        CaptureSettings {
            max_repeated: 2,
            diff_threshold: 10,
            ..CaptureSettings::default()
        }
    }

    fn hash() -> BlockHash {
        BlockHash::from_hex("00ff").unwrap()
    }

    #[test]
    fn first_frame_is_always_kept() {
        let mut state = LoopState::new();
        state.begin();
        assert_eq!(state.status, LoopStatus::Running);
        assert_eq!(state.decide(None, &settings()), TickDecision::Keep);
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut state = LoopState::new();
        state.record_kept(hash());
        assert_eq!(state.decide(Some(10), &settings()), TickDecision::Discard);
        assert_eq!(state.decide(Some(11), &settings()), TickDecision::Keep);
    }

    #[test]
    fn streak_resets_when_a_frame_is_kept() {
        let mut state = LoopState::new();
        state.record_kept(hash());
        state.record_repeated();
        state.record_repeated();
        assert_eq!(state.repeated_count, 2);

        state.record_kept(hash());
        assert_eq!(state.repeated_count, 0);
        assert_eq!(state.kept_count, 2);
    }

    #[test]
    fn stops_once_streak_exceeds_limit() {
        let mut state = LoopState::new();
        state.record_kept(hash());
        for _ in 0..2 {
            state.record_repeated();
        }
        assert_eq!(state.decide(Some(0), &settings()), TickDecision::Discard);
        state.record_repeated();
        assert_eq!(
            state.decide(Some(500), &settings()),
            TickDecision::Stop(StopReason::RepeatedLimit)
        );
    }

    #[test]
    fn user_signal_wins_over_new_content() {
        let mut state = LoopState::new();
        state.done = true;
        assert_eq!(
            state.decide(None, &settings()),
            TickDecision::Stop(StopReason::UserSignal)
        );
    }

    #[test]
    fn begin_resets_everything() {
        let mut state = LoopState::new();
        state.record_kept(hash());
        state.ticks = 9;
        state.done = true;
        state.begin();
        assert_eq!(state.kept_count, 0);
        assert_eq!(state.ticks, 0);
        assert!(state.last_hash.is_none());
        assert!(!state.done);
    }
}
