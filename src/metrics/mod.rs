mod types;

pub use types::{CycleMetrics, CycleOutcome, MetricsSnapshot, SystemMetrics};

use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Mutex;

const MAX_RECENT_CYCLES: usize = 20;

/// Detection-cycle timings plus this process's CPU and memory.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    recent_cycles: Vec<CycleMetrics>,
    cycle_count: u64,
    no_signal_count: u64,
    failure_count: u64,
    system: System,
    pid: Pid,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // First refresh sets the baseline CPU usage is measured against.
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self {
            inner: Arc::new(Mutex::new(MetricsState {
                recent_cycles: Vec::with_capacity(MAX_RECENT_CYCLES),
                cycle_count: 0,
                no_signal_count: 0,
                failure_count: 0,
                system,
                pid,
            })),
        }
    }

    pub async fn record_cycle(&self, metrics: CycleMetrics) {
        let mut state = self.inner.lock().await;

        state.cycle_count += 1;
        match metrics.outcome {
            CycleOutcome::NoSignal => state.no_signal_count += 1,
            CycleOutcome::Failed => state.failure_count += 1,
            CycleOutcome::Processed => {}
        }

        state.recent_cycles.push(metrics);
        if state.recent_cycles.len() > MAX_RECENT_CYCLES {
            state.recent_cycles.remove(0);
        }
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let mut state = self.inner.lock().await;
        let pid = state.pid;
        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        let system = state
            .system
            .process(pid)
            .map(|process| SystemMetrics {
                cpu_percent: process.cpu_usage(),
                memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
            })
            .unwrap_or_default();

        let avg_inference_ms = if state.recent_cycles.is_empty() {
            0.0
        } else {
            state.recent_cycles.iter().map(|c| c.inference_ms as f64).sum::<f64>()
                / state.recent_cycles.len() as f64
        };

        MetricsSnapshot {
            system,
            recent_cycles: state.recent_cycles.clone(),
            cycle_count: state.cycle_count,
            no_signal_count: state.no_signal_count,
            failure_count: state.failure_count,
            avg_inference_ms,
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        let pid = state.pid;
        state.recent_cycles.clear();
        state.cycle_count = 0;
        state.no_signal_count = 0;
        state.failure_count = 0;
        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
