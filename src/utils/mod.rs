pub mod fs;
pub mod logging;

pub use fs::{file_timestamp, unique_frame_path, TempDirGuard};
pub use logging::init_logging;
