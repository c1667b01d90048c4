pub mod config;
pub mod consistency;
pub mod quality;
pub mod smoother;
pub mod threshold;
pub mod types;

pub use config::DetectionConfig;
pub use consistency::ConsistencyTracker;
pub use quality::keypoint_quality;
pub use smoother::PredictionSmoother;
pub use threshold::AdaptiveThreshold;
pub use types::{Keypoint, PoseFrame, PostureClass, Reading, StabilizedPrediction};
