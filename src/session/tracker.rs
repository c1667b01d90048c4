use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::clock::Clock;
use crate::posture::PostureClass;
use crate::stats::Session;

use super::state::{SessionEnd, TrackerSnapshot, TrackerStatus};

const MINUTE_MS: i64 = 60_000;

/// Folds per-frame readings into the active session.
pub struct SessionTracker {
    status: TrackerStatus,
    current: Option<Session>,
    clock: Arc<dyn Clock>,
    qualifying_confidence: f64,
}

impl SessionTracker {
    pub fn new(clock: Arc<dyn Clock>, qualifying_confidence: f64) -> Self {
        Self {
            status: TrackerStatus::Idle,
            current: None,
            clock,
            qualifying_confidence,
        }
    }

    /// Idle -> Active. Returns the start time, or `None` if a session is
    /// already running (left untouched).
    pub fn start(&mut self) -> Option<DateTime<Utc>> {
        if self.status == TrackerStatus::Active {
            warn!("Session start ignored: a session is already active");
            return None;
        }

        let started_at = self.clock.now();
        self.current = Some(Session::started(started_at));
        self.status = TrackerStatus::Active;
        info!("Posture session started at {}", started_at.to_rfc3339());
        Some(started_at)
    }

    pub fn add_reading(&mut self, class: PostureClass, confidence: f64) {
        let Some(session) = self.current.as_mut() else {
            return;
        };

        session.confidence.push(confidence);
        session.total_readings += 1;
        if class == PostureClass::Good && confidence > self.qualifying_confidence {
            session.good_posture_readings += 1;
        }
        session.good_posture_percentage =
            session.good_posture_readings as f64 / session.total_readings as f64 * 100.0;
    }

    /// Active -> Idle. Sessions shorter than a minute are discarded; longer
    /// ones get their duration stamped in whole minutes (rounded).
    pub fn end(&mut self) -> SessionEnd {
        let Some(mut session) = self.current.take() else {
            return SessionEnd::NotActive;
        };
        self.status = TrackerStatus::Idle;

        let elapsed_ms = (self.clock.now() - session.timestamp).num_milliseconds();
        if elapsed_ms < MINUTE_MS {
            info!("Posture session discarded after {elapsed_ms}ms (under a minute)");
            return SessionEnd::Discarded { elapsed_ms };
        }

        session.duration = ((elapsed_ms + MINUTE_MS / 2) / MINUTE_MS) as u32;
        info!(
            "Posture session finished: {} min, {} readings, {:.1}% good",
            session.duration, session.total_readings, session.good_posture_percentage
        );
        SessionEnd::Finished(session)
    }

    pub fn status(&self) -> TrackerStatus {
        self.status
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        match &self.current {
            Some(session) => TrackerSnapshot {
                status: self.status,
                started_at: Some(session.timestamp),
                elapsed_ms: (self.clock.now() - session.timestamp).num_milliseconds(),
                total_readings: session.total_readings,
                good_posture_percentage: session.good_posture_percentage,
            },
            None => TrackerSnapshot {
                status: self.status,
                started_at: None,
                elapsed_ms: 0,
                total_readings: 0,
                good_posture_percentage: 0.0,
            },
        }
    }
}
