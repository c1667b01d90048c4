use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use super::models::{Session, UserPostureStats};

const TREND_WINDOW: usize = 3;
const TREND_INSIGHT_MIN_DELTA: i64 = 10;
const FREQUENCY_LOOKBACK_DAYS: i64 = 7;
const FREQUENCY_MIN_SESSIONS: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InsightKind {
    Success,
    Info,
    Warning,
    Urgent,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub kind: InsightKind,
    pub title: String,
    pub message: String,
}

impl Insight {
    fn new(kind: InsightKind, title: &str, message: String) -> Self {
        Self {
            kind,
            title: title.to_string(),
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyAverage {
    pub date: NaiveDate,
    pub average: f64,
}

/// Everything the dashboard renders, computed in one pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub stats: UserPostureStats,
    pub improvement: i64,
    pub insights: Vec<Insight>,
    pub recent_sessions: Vec<Session>,
    pub daily_averages: Vec<DailyAverage>,
}

impl ProgressReport {
    pub fn build<Tz: TimeZone>(stats: UserPostureStats, now: DateTime<Tz>) -> Self {
        let now_utc = now.with_timezone(&Utc);
        Self {
            improvement: improvement(&stats.sessions),
            insights: insights(&stats, now_utc),
            recent_sessions: recent_sessions(&stats.sessions, 5)
                .into_iter()
                .cloned()
                .collect(),
            daily_averages: daily_averages(&stats.sessions, 7, now),
            stats,
        }
    }
}

/// Rounds half up, so -2.5 becomes -2.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn mean_percentage(sessions: &[Session]) -> f64 {
    sessions.iter().map(|s| s.good_posture_percentage).sum::<f64>() / sessions.len() as f64
}

/// Mean good-posture % of the last three sessions minus that of the three
/// before them, rounded. 0 when there is nothing to compare against.
pub fn improvement(sessions: &[Session]) -> i64 {
    let len = sessions.len();
    if len < 2 {
        return 0;
    }

    let recent = &sessions[len.saturating_sub(TREND_WINDOW)..];
    let previous = &sessions[len.saturating_sub(TREND_WINDOW * 2)..len.saturating_sub(TREND_WINDOW)];
    if previous.is_empty() {
        return 0;
    }

    round_half_up(mean_percentage(recent) - mean_percentage(previous))
}

/// Performance band first (always exactly one), then the optional trend and
/// frequency insights.
pub fn insights(stats: &UserPostureStats, now: DateTime<Utc>) -> Vec<Insight> {
    let mut out = Vec::with_capacity(3);
    let avg = stats.avg_good_posture;

    out.push(if avg >= 85.0 {
        Insight::new(
            InsightKind::Success,
            "Excellent posture",
            format!("You keep good posture {avg:.0}% of the time. Keep it up!"),
        )
    } else if avg >= 70.0 {
        Insight::new(
            InsightKind::Info,
            "Good posture",
            format!("You're at {avg:.0}% good posture. A little more focus gets you to excellent."),
        )
    } else if avg >= 50.0 {
        Insight::new(
            InsightKind::Warning,
            "Room for improvement",
            format!("Only {avg:.0}% good posture. Check your chair height and screen position."),
        )
    } else {
        Insight::new(
            InsightKind::Urgent,
            "Posture needs attention",
            format!("Good posture just {avg:.0}% of the time. Take regular breaks and reset your setup."),
        )
    });

    let delta = improvement(&stats.sessions);
    if delta.abs() > TREND_INSIGHT_MIN_DELTA {
        out.push(if delta > 0 {
            Insight::new(
                InsightKind::Success,
                "Improving",
                format!("Your recent sessions are up {delta} points on the ones before."),
            )
        } else {
            Insight::new(
                InsightKind::Warning,
                "Slipping",
                format!("Your recent sessions are down {} points on the ones before.", -delta),
            )
        });
    }

    let cutoff = now - Duration::days(FREQUENCY_LOOKBACK_DAYS);
    let this_week = stats
        .sessions
        .iter()
        .filter(|s| s.timestamp >= cutoff)
        .count();
    if this_week < FREQUENCY_MIN_SESSIONS {
        out.push(Insight::new(
            InsightKind::Info,
            "Monitor more often",
            format!(
                "{this_week} session(s) in the last week. Aim for at least {FREQUENCY_MIN_SESSIONS} to build the habit."
            ),
        ));
    }

    out
}

/// Last `n` sessions, newest first.
pub fn recent_sessions(sessions: &[Session], n: usize) -> Vec<&Session> {
    sessions.iter().rev().take(n).collect()
}

/// Mean good-posture % per calendar day (in `now`'s time zone) for the last
/// `days` days, oldest first. Days without sessions report 0.
pub fn daily_averages<Tz: TimeZone>(
    sessions: &[Session],
    days: u32,
    now: DateTime<Tz>,
) -> Vec<DailyAverage> {
    let zone = now.timezone();
    let today = now.date_naive();

    (0..days as i64)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let (sum, count) = sessions
                .iter()
                .filter(|s| s.timestamp.with_timezone(&zone).date_naive() == date)
                .fold((0.0, 0usize), |(sum, count), s| {
                    (sum + s.good_posture_percentage, count + 1)
                });
            DailyAverage {
                date,
                average: if count == 0 { 0.0 } else { sum / count as f64 },
            }
        })
        .collect()
}
