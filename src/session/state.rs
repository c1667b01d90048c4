use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::Session;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TrackerStatus {
    #[default]
    Idle,
    Active,
}

/// How a call to `SessionTracker::end` resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// Nothing was running.
    NotActive,
    /// Ran for under a minute; dropped by policy.
    Discarded { elapsed_ms: i64 },
    /// Duration stamped, ready to be folded into user stats.
    Finished(Session),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub status: TrackerStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_ms: i64,
    pub total_readings: u32,
    pub good_posture_percentage: f64,
}
