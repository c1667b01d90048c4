use super::config::DetectionConfig;

/// Slow walk of a display threshold driven by recent confidence.
///
/// Telemetry only: nothing in the alerting or session path reads it.
#[derive(Debug, Clone)]
pub struct AdaptiveThreshold {
    threshold: f64,
    step: f64,
    min: f64,
    max: f64,
    raise_above: f64,
    lower_below: f64,
}

impl AdaptiveThreshold {
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            threshold: config.adaptive_initial,
            step: config.adaptive_step,
            min: config.adaptive_min,
            max: config.adaptive_max,
            raise_above: config.adaptive_raise_above,
            lower_below: config.adaptive_lower_below,
        }
    }

    pub fn update(&mut self, confidence: f64) -> f64 {
        if confidence > self.raise_above {
            self.threshold = (self.threshold + self.step).min(self.max);
        } else if confidence < self.lower_below {
            self.threshold = (self.threshold - self.step).max(self.min);
        }
        self.threshold
    }

    pub fn value(&self) -> f64 {
        self.threshold
    }
}
