use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::posture::{DetectionConfig, PostureClass};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationState {
    pub consecutive_bad_count: u32,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub cooldown_ms: i64,
    pub trigger_threshold: u32,
}

/// Hysteresis plus cooldown over the smoothed "bad posture" signal.
pub struct NotificationEngine {
    state: NotificationState,
    qualifying_confidence: f64,
}

impl NotificationEngine {
    pub fn new(cooldown_ms: i64, trigger_threshold: u32, qualifying_confidence: f64) -> Self {
        Self {
            state: NotificationState {
                consecutive_bad_count: 0,
                last_fired_at: None,
                cooldown_ms,
                trigger_threshold,
            },
            qualifying_confidence,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            config.notification_cooldown_ms,
            config.notification_trigger,
            config.qualifying_confidence,
        )
    }

    /// Returns true when the caller should dispatch an alert.
    pub fn observe(&mut self, class: PostureClass, confidence: f64, now: DateTime<Utc>) -> bool {
        // NaN never qualifies
        let qualifies = confidence > self.qualifying_confidence;
        if !qualifies {
            return false;
        }

        match class {
            PostureClass::Good => {
                self.state.consecutive_bad_count = 0;
                false
            }
            PostureClass::Bad => {
                self.state.consecutive_bad_count += 1;
                if self.state.consecutive_bad_count >= self.state.trigger_threshold
                    && self.cooldown_elapsed(now)
                {
                    self.state.last_fired_at = Some(now);
                    self.state.consecutive_bad_count = 0;
                    true
                } else {
                    false
                }
            }
            PostureClass::LeaningForward => false,
        }
    }

    pub fn state(&self) -> &NotificationState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state.consecutive_bad_count = 0;
        self.state.last_fired_at = None;
    }

    fn cooldown_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.state
            .last_fired_at
            .map(|fired| now - fired > Duration::milliseconds(self.state.cooldown_ms))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn at(ms: i64) -> DateTime<Utc> {
        t0() + Duration::milliseconds(ms)
    }

    #[test]
    fn second_bad_fires_then_cooldown_blocks() {
        let mut engine = NotificationEngine::new(10_000, 2, 0.6);

        assert!(!engine.observe(PostureClass::Bad, 0.8, at(0)));
        assert!(engine.observe(PostureClass::Bad, 0.8, at(3_000)));
        assert!(!engine.observe(PostureClass::Bad, 0.8, at(5_000)));
        assert_eq!(engine.state().last_fired_at, Some(at(3_000)));
    }

    #[test]
    fn good_observation_resets_run() {
        let mut engine = NotificationEngine::new(10_000, 2, 0.6);

        engine.observe(PostureClass::Bad, 0.9, at(0));
        engine.observe(PostureClass::Good, 0.9, at(100));
        assert!(!engine.observe(PostureClass::Bad, 0.9, at(200)));
        assert!(engine.observe(PostureClass::Bad, 0.9, at(300)));
    }

    #[test]
    fn weak_and_leaning_observations_change_nothing() {
        let mut engine = NotificationEngine::new(10_000, 2, 0.6);

        engine.observe(PostureClass::Bad, 0.9, at(0));
        assert!(!engine.observe(PostureClass::Good, 0.6, at(100)));
        assert!(!engine.observe(PostureClass::LeaningForward, 0.95, at(200)));
        assert!(!engine.observe(PostureClass::Bad, 0.5, at(300)));
        assert_eq!(engine.state().consecutive_bad_count, 1);

        assert!(engine.observe(PostureClass::Bad, 0.9, at(400)));
    }

    #[test]
    fn nan_confidence_is_ignored() {
        let mut engine = NotificationEngine::new(10_000, 2, 0.6);

        assert!(!engine.observe(PostureClass::Bad, f64::NAN, at(0)));
        assert!(!engine.observe(PostureClass::Bad, f64::NAN, at(3_000)));
        assert_eq!(engine.state().consecutive_bad_count, 0);

        engine.observe(PostureClass::Bad, 0.9, at(4_000));
        engine.observe(PostureClass::Good, f64::NAN, at(4_100));
        assert_eq!(engine.state().consecutive_bad_count, 1);
    }

    #[test]
    fn fires_again_only_after_cooldown() {
        let mut engine = NotificationEngine::new(10_000, 2, 0.6);
        let mut fired_at = Vec::new();

        for step in 0..200 {
            let now = at(step * 250);
            if engine.observe(PostureClass::Bad, 0.9, now) {
                fired_at.push(now);
            }
        }

        assert!(fired_at.len() >= 2);
        for pair in fired_at.windows(2) {
            assert!(pair[1] - pair[0] > Duration::milliseconds(10_000));
        }
    }

    #[test]
    fn reset_clears_cooldown() {
        let mut engine = NotificationEngine::new(10_000, 2, 0.6);
        engine.observe(PostureClass::Bad, 0.9, at(0));
        assert!(engine.observe(PostureClass::Bad, 0.9, at(10)));

        engine.reset();

        engine.observe(PostureClass::Bad, 0.9, at(20));
        assert!(engine.observe(PostureClass::Bad, 0.9, at(30)));
    }
}
