use std::collections::VecDeque;

use super::types::{PostureClass, Reading, StabilizedPrediction};

/// Majority-vote smoother over the last few raw readings.
pub struct PredictionSmoother {
    window: VecDeque<Reading>,
    window_size: usize,
    stable_confidence: f64,
}

impl PredictionSmoother {
    pub fn new(window_size: usize, stable_confidence: f64) -> Self {
        let window_size = window_size.max(1);
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            stable_confidence,
        }
    }

    /// Push a reading and return the stabilized class/confidence.
    ///
    /// With fewer than two readings, or when no class repeats in the window,
    /// the newest reading is returned as-is. Otherwise the most frequent class
    /// wins (ties go to the class seen first) and its confidence is the mean
    /// over that class's readings only.
    pub fn observe(&mut self, reading: Reading) -> StabilizedPrediction {
        self.window.push_back(reading);
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }

        if self.window.len() < 2 {
            return self.passthrough(&reading);
        }

        let tallies = self.tally();
        let mut winner = tallies[0];
        for &entry in &tallies[1..] {
            if entry.1 > winner.1 {
                winner = entry;
            }
        }

        let (class, max_count) = winner;
        if max_count == 1 {
            return self.passthrough(&reading);
        }

        let confidence = self
            .window
            .iter()
            .filter(|r| r.posture_class == class)
            .map(|r| r.confidence)
            .sum::<f64>()
            / max_count as f64;

        StabilizedPrediction {
            posture_class: class,
            confidence,
            is_stable: confidence > self.stable_confidence,
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Per-class counts in first-seen order.
    fn tally(&self) -> Vec<(PostureClass, usize)> {
        let mut tallies: Vec<(PostureClass, usize)> = Vec::with_capacity(3);
        for reading in &self.window {
            match tallies.iter_mut().find(|(class, _)| *class == reading.posture_class) {
                Some((_, count)) => *count += 1,
                None => tallies.push((reading.posture_class, 1)),
            }
        }
        tallies
    }

    fn passthrough(&self, reading: &Reading) -> StabilizedPrediction {
        StabilizedPrediction {
            posture_class: reading.posture_class,
            confidence: reading.confidence,
            is_stable: reading.confidence > self.stable_confidence,
        }
    }
}
