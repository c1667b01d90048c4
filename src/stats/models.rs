//! Persisted posture analytics.
//!
//! A `Session` is one capture-start to capture-stop interval of at least a
//! minute. `UserPostureStats` is the per-user roll-up; its totals are always
//! recomputed from `sessions` rather than patched incrementally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WEEKLY_GOAL: f64 = 80.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Capture start, serialized as RFC 3339.
    pub timestamp: DateTime<Utc>,
    /// Whole minutes.
    pub duration: u32,
    pub total_readings: u32,
    pub good_posture_readings: u32,
    pub good_posture_percentage: f64,
    pub confidence: Vec<f64>,
}

impl Session {
    pub fn started(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            duration: 0,
            total_readings: 0,
            good_posture_readings: 0,
            good_posture_percentage: 0.0,
            confidence: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPostureStats {
    pub sessions: Vec<Session>,
    pub total_sessions: u32,
    pub total_time: u32,
    pub avg_good_posture: f64,
    pub weekly_goal: f64,
}

impl Default for UserPostureStats {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            total_sessions: 0,
            total_time: 0,
            avg_good_posture: 0.0,
            weekly_goal: DEFAULT_WEEKLY_GOAL,
        }
    }
}

impl UserPostureStats {
    /// Append a finished session, then recompute count, time and average.
    pub fn record_session(&mut self, session: Session) {
        self.sessions.push(session);
        self.recompute();
    }

    pub fn recompute(&mut self) {
        self.total_sessions = self.sessions.len() as u32;
        self.total_time = self.sessions.iter().map(|s| s.duration).sum();
        self.avg_good_posture = if self.sessions.is_empty() {
            0.0
        } else {
            self.sessions
                .iter()
                .map(|s| s.good_posture_percentage)
                .sum::<f64>()
                / self.sessions.len() as f64
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(duration: u32, pct: f64) -> Session {
        Session {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            duration,
            total_readings: 10,
            good_posture_readings: (pct / 10.0) as u32,
            good_posture_percentage: pct,
            confidence: vec![0.9],
        }
    }

    #[test]
    fn totals_follow_sessions() {
        let mut stats = UserPostureStats::default();
        stats.record_session(session(2, 80.0));
        stats.record_session(session(5, 50.0));
        stats.record_session(session(1, 20.0));

        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.total_sessions as usize, stats.sessions.len());
        assert_eq!(stats.total_time, 8);
        assert!((stats.avg_good_posture - 50.0).abs() < 1e-9);
        assert_eq!(stats.weekly_goal, DEFAULT_WEEKLY_GOAL);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut stats = UserPostureStats::default();
        stats.record_session(session(2, 80.0));
        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(json["totalSessions"], 1);
        assert_eq!(json["sessions"][0]["goodPosturePercentage"], 80.0);
        assert_eq!(json["sessions"][0]["timestamp"], "2026-03-02T09:00:00Z");
    }
}
