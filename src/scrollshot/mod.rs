pub mod controller;
pub mod joiner;
pub mod session;

pub use controller::{run_scrollshot, ScrollshotController, ScrollshotJob, ScrollshotSignals};
pub use joiner::{ChatJoiner, ImageJoiner, JoinRequest};
pub use session::{finish, output_dir, RESULT_FILE_NAME};
