pub mod config;
pub mod loop_worker;
pub mod provider;
pub mod quick;
pub mod replay;
pub mod state;

pub use config::CaptureSettings;
pub use loop_worker::{run_capture_loop, CaptureOutcome, CaptureRequest};
pub use provider::{
    encode_area, find_source_by_display, CaptureArea, CaptureFrame, CaptureProvider,
    CapturedStill, DisplaySource, DisplayTarget,
};
pub use quick::quick_capture;
pub use replay::ReplayCaptureProvider;
pub use state::{LoopState, LoopStatus, StopReason, TickDecision};
