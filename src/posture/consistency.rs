use std::collections::VecDeque;

use super::types::PostureClass;

const NEUTRAL_RATIO: f64 = 0.5;

/// Medium-horizon agreement among recent stabilized labels.
pub struct ConsistencyTracker {
    labels: VecDeque<PostureClass>,
    capacity: usize,
    min_history: usize,
}

impl ConsistencyTracker {
    pub fn new(capacity: usize, min_history: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            labels: VecDeque::with_capacity(capacity),
            capacity,
            min_history,
        }
    }

    /// Returns the share of the window held by its most frequent label, or 0.5
    /// until `min_history` labels have been seen.
    pub fn observe(&mut self, label: PostureClass) -> f64 {
        self.labels.push_back(label);
        while self.labels.len() > self.capacity {
            self.labels.pop_front();
        }

        if self.labels.len() < self.min_history {
            return NEUTRAL_RATIO;
        }

        let mut counts = [0usize; 3];
        for label in &self.labels {
            counts[slot(*label)] += 1;
        }
        let mode = counts.iter().copied().max().unwrap_or(0);

        mode as f64 / self.labels.len() as f64
    }

    pub fn reset(&mut self) {
        self.labels.clear();
    }
}

fn slot(label: PostureClass) -> usize {
    match label {
        PostureClass::Good => 0,
        PostureClass::Bad => 1,
        PostureClass::LeaningForward => 2,
    }
}
