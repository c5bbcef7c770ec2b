pub mod session;

pub use session::{ScrollshotSession, SessionStatus};
