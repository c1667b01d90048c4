pub mod controller;
pub mod loop_worker;
pub mod pipeline;

pub use controller::{MonitorController, StopOutcome};
pub use pipeline::{FrameUpdate, PosturePipeline};
