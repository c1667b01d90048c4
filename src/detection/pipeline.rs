use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::notify::NotificationEngine;
use crate::posture::{
    keypoint_quality, AdaptiveThreshold, ConsistencyTracker, DetectionConfig, PoseFrame,
    PredictionSmoother, Reading, StabilizedPrediction,
};
use crate::session::{SessionEnd, SessionTracker, TrackerSnapshot};

const ENABLE_LOGS: bool = false;

use crate::log_debug;

/// Everything the UI needs to render one processed frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameUpdate {
    pub reading: Reading,
    pub stabilized: StabilizedPrediction,
    pub keypoint_quality: f64,
    pub low_quality: bool,
    pub consistency: f64,
    pub adaptive_threshold: f64,
    pub alert: bool,
}

/// Synchronous per-frame fold over all posture components.
pub struct PosturePipeline {
    config: DetectionConfig,
    clock: Arc<dyn Clock>,
    smoother: PredictionSmoother,
    consistency: ConsistencyTracker,
    threshold: AdaptiveThreshold,
    notifications: NotificationEngine,
    session: SessionTracker,
}

impl PosturePipeline {
    pub fn new(config: DetectionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            smoother: PredictionSmoother::new(config.smoothing_window, config.stable_confidence),
            consistency: ConsistencyTracker::new(
                config.consistency_window,
                config.consistency_min_history,
            ),
            threshold: AdaptiveThreshold::from_config(&config),
            notifications: NotificationEngine::from_config(&config),
            session: SessionTracker::new(clock.clone(), config.qualifying_confidence),
            clock,
            config,
        }
    }

    /// Fails when the classifier label is not a posture class or the
    /// confidence is not a finite number; state is untouched in that case.
    pub fn process(&mut self, frame: &PoseFrame) -> Result<FrameUpdate> {
        let posture_class = frame.posture_class()?;
        if !frame.confidence.is_finite() {
            bail!("classifier confidence is not finite: {}", frame.confidence);
        }
        let now = self.clock.now();

        let reading = Reading {
            timestamp: now,
            posture_class,
            confidence: frame.confidence.clamp(0.0, 1.0),
        };

        let quality = keypoint_quality(&frame.keypoints, self.config.keypoint_visibility_floor);
        let stabilized = self.smoother.observe(reading);
        let consistency = self.consistency.observe(stabilized.posture_class);
        let adaptive_threshold = self.threshold.update(stabilized.confidence);
        let alert = self
            .notifications
            .observe(stabilized.posture_class, stabilized.confidence, now);
        self.session
            .add_reading(stabilized.posture_class, stabilized.confidence);

        log_debug!(
            "raw {}@{:.2} -> {}@{:.2} consistency {:.2} quality {:.2}{}",
            reading.posture_class,
            reading.confidence,
            stabilized.posture_class,
            stabilized.confidence,
            consistency,
            quality,
            if alert { " ALERT" } else { "" }
        );

        Ok(FrameUpdate {
            reading,
            stabilized,
            keypoint_quality: quality,
            low_quality: quality < self.config.low_quality_warning,
            consistency,
            adaptive_threshold,
            alert,
        })
    }

    pub fn start_session(&mut self) -> Option<DateTime<Utc>> {
        self.session.start()
    }

    /// Ends the session and clears every per-session window.
    pub fn end_session(&mut self) -> SessionEnd {
        let outcome = self.session.end();
        self.smoother.reset();
        self.consistency.reset();
        self.notifications.reset();
        outcome
    }

    pub fn session_snapshot(&self) -> TrackerSnapshot {
        self.session.snapshot()
    }

    pub fn adaptive_threshold(&self) -> f64 {
        self.threshold.value()
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::posture::{Keypoint, PostureClass};
    use crate::session::TrackerStatus;
    use chrono::TimeZone;

    fn frame(class: &str, confidence: f64) -> PoseFrame {
        PoseFrame {
            keypoints: vec![
                Keypoint {
                    x: 0.0,
                    y: 0.0,
                    score: 0.9
                };
                17
            ],
            class_label: class.to_string(),
            confidence,
        }
    }

    fn pipeline(window: usize) -> (PosturePipeline, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
        let config = DetectionConfig {
            smoothing_window: window,
            ..DetectionConfig::default()
        };
        (PosturePipeline::new(config, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn smoothed_bad_run_raises_alert() {
        let (mut pipeline, clock) = pipeline(3);
        pipeline.start_session();

        let first = pipeline.process(&frame("good", 0.9)).unwrap();
        assert!(!first.alert);
        assert!((first.keypoint_quality - 0.9).abs() < 1e-9);
        assert!(!first.low_quality);

        clock.advance_ms(100);
        let second = pipeline.process(&frame("bad", 0.7)).unwrap();
        assert_eq!(second.stabilized.posture_class, PostureClass::Bad);
        assert!(!second.alert);

        clock.advance_ms(100);
        let third = pipeline.process(&frame("bad", 0.8)).unwrap();
        assert_eq!(third.stabilized.posture_class, PostureClass::Bad);
        assert!((third.stabilized.confidence - 0.75).abs() < 1e-9);
        assert!(third.alert);
    }

    #[test]
    fn unknown_label_leaves_state_alone() {
        let (mut pipeline, _clock) = pipeline(3);
        pipeline.start_session();

        assert!(pipeline.process(&frame("standing", 0.9)).is_err());
        assert_eq!(pipeline.session_snapshot().total_readings, 0);
    }

    #[test]
    fn non_finite_confidence_is_rejected() {
        let (mut pipeline, _clock) = pipeline(3);
        pipeline.start_session();
        pipeline.process(&frame("bad", 0.9)).unwrap();

        assert!(pipeline.process(&frame("bad", f64::NAN)).is_err());
        assert!(pipeline.process(&frame("bad", f64::INFINITY)).is_err());
        assert_eq!(pipeline.session_snapshot().total_readings, 1);

        // a NaN frame must not have counted towards the bad run either
        let update = pipeline.process(&frame("bad", 0.9)).unwrap();
        assert!(update.alert);
        assert_eq!(pipeline.session_snapshot().total_readings, 2);
    }

    #[test]
    fn sparse_skeleton_is_flagged_low_quality() {
        let (mut pipeline, _clock) = pipeline(3);
        let mut sparse = frame("good", 0.9);
        sparse.keypoints.iter_mut().for_each(|k| k.score = 0.1);

        let update = pipeline.process(&sparse).unwrap();
        assert_eq!(update.keypoint_quality, 0.0);
        assert!(update.low_quality);
    }

    #[test]
    fn session_counts_stabilized_readings() {
        let (mut pipeline, clock) = pipeline(3);
        pipeline.start_session();
        for _ in 0..8 {
            pipeline.process(&frame("good", 0.9)).unwrap();
        }
        for _ in 0..2 {
            pipeline.process(&frame("bad", 0.9)).unwrap();
        }
        clock.advance_ms(3 * 60_000);

        match pipeline.end_session() {
            SessionEnd::Finished(session) => {
                assert_eq!(session.total_readings, 10);
                // first bad is outvoted by the two goods still in the window
                assert_eq!(session.good_posture_readings, 9);
                assert_eq!(session.duration, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(pipeline.session_snapshot().status, TrackerStatus::Idle);
    }

    #[test]
    fn end_session_resets_alert_hysteresis() {
        let (mut pipeline, _clock) = pipeline(3);
        pipeline.start_session();
        pipeline.process(&frame("bad", 0.9)).unwrap();
        pipeline.end_session();

        pipeline.start_session();
        let update = pipeline.process(&frame("bad", 0.9)).unwrap();
        assert!(!update.alert);
    }
}
