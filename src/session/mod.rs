pub mod state;
pub mod tracker;

pub use state::{SessionEnd, TrackerSnapshot, TrackerStatus};
pub use tracker::SessionTracker;
