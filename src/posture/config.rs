use serde::{Deserialize, Serialize};

/// Tunable thresholds for the per-frame pipeline, the notification engine and
/// session accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionConfig {
    /// Readings kept by the prediction smoother.
    pub smoothing_window: usize,
    /// Stabilized confidence above this marks a prediction stable.
    pub stable_confidence: f64,

    /// Stabilized labels kept by the consistency tracker.
    pub consistency_window: usize,
    /// Below this many labels the consistency ratio is reported as neutral.
    pub consistency_min_history: usize,

    /// Confidence a Good/Bad reading must exceed to count for alerts and
    /// good-posture accounting.
    pub qualifying_confidence: f64,
    pub notification_cooldown_ms: i64,
    /// Consecutive qualifying Bad observations needed before an alert.
    pub notification_trigger: u32,

    /// Adaptive threshold walk (display only)
    pub adaptive_initial: f64,
    pub adaptive_step: f64,
    pub adaptive_min: f64,
    pub adaptive_max: f64,
    pub adaptive_raise_above: f64,
    pub adaptive_lower_below: f64,

    pub keypoint_visibility_floor: f64,
    /// Keypoint quality below this raises the low-quality warning.
    pub low_quality_warning: f64,

    pub frame_interval_ms: u64,
    /// Stored with user stats; not read by any aggregation.
    pub weekly_goal: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 5,
            stable_confidence: 0.5,
            consistency_window: 10,
            consistency_min_history: 3,
            qualifying_confidence: 0.6,
            notification_cooldown_ms: 10_000,
            notification_trigger: 2,
            adaptive_initial: 0.6,
            adaptive_step: 0.01,
            adaptive_min: 0.3,
            adaptive_max: 0.9,
            adaptive_raise_above: 0.8,
            adaptive_lower_below: 0.5,
            keypoint_visibility_floor: 0.2,
            low_quality_warning: 0.2,
            frame_interval_ms: 100,
            weekly_goal: 80.0,
        }
    }
}
