use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CycleOutcome {
    Processed,
    NoSignal,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleMetrics {
    pub timestamp: DateTime<Utc>,
    pub outcome: CycleOutcome,
    pub inference_ms: u64,
    pub pipeline_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub system: SystemMetrics,
    pub recent_cycles: Vec<CycleMetrics>,
    pub cycle_count: u64,
    pub no_signal_count: u64,
    pub failure_count: u64,
    pub avg_inference_ms: f64,
}
