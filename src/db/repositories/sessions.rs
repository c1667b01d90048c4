use anyhow::{Context, Result};
use chrono::Utc;
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_u32},
};
use crate::stats::{Session, UserPostureStats, DEFAULT_WEEKLY_GOAL};

fn row_to_session(row: &Row) -> Result<Session> {
    let started_at: String = row.get("started_at")?;
    let confidence_json: String = row.get("confidence_json")?;

    Ok(Session {
        timestamp: parse_datetime(&started_at, "started_at")?,
        duration: to_u32(row.get("duration_minutes")?, "duration_minutes")?,
        total_readings: to_u32(row.get("total_readings")?, "total_readings")?,
        good_posture_readings: to_u32(row.get("good_readings")?, "good_readings")?,
        good_posture_percentage: row.get("good_percentage")?,
        confidence: serde_json::from_str(&confidence_json)
            .context("failed to parse confidence_json")?,
    })
}

struct StoredTotals {
    total_sessions: i64,
    total_time: i64,
    avg_good_posture: f64,
    weekly_goal: f64,
}

fn load_stats(conn: &Connection, user_id: &str) -> Result<UserPostureStats> {
    let mut stmt = conn.prepare(
        "SELECT started_at, duration_minutes, total_readings, good_readings, good_percentage, confidence_json
         FROM posture_sessions
         WHERE user_id = ?1
         ORDER BY rowid ASC",
    )?;

    let mut rows = stmt.query(params![user_id])?;
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_session(row)?);
    }

    let stored = conn
        .query_row(
            "SELECT total_sessions, total_time, avg_good_posture, weekly_goal
             FROM posture_stats
             WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(StoredTotals {
                    total_sessions: row.get(0)?,
                    total_time: row.get(1)?,
                    avg_good_posture: row.get(2)?,
                    weekly_goal: row.get(3)?,
                })
            },
        )
        .optional()?;

    let mut stats = UserPostureStats {
        sessions,
        weekly_goal: stored
            .as_ref()
            .map(|totals| totals.weekly_goal)
            .unwrap_or(DEFAULT_WEEKLY_GOAL),
        ..UserPostureStats::default()
    };
    stats.recompute();

    if let Some(totals) = stored {
        let drifted = totals.total_sessions != i64::from(stats.total_sessions)
            || totals.total_time != i64::from(stats.total_time)
            || (totals.avg_good_posture - stats.avg_good_posture).abs() > 1e-6;
        if drifted {
            warn!("Stored posture totals for user {user_id} disagree with session rows; using recomputed values");
        }
    }

    Ok(stats)
}

fn write_totals(conn: &Connection, user_id: &str, stats: &UserPostureStats) -> Result<()> {
    conn.execute(
        "INSERT INTO posture_stats (user_id, total_sessions, total_time, avg_good_posture, weekly_goal, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
             total_sessions = excluded.total_sessions,
             total_time = excluded.total_time,
             avg_good_posture = excluded.avg_good_posture,
             weekly_goal = excluded.weekly_goal,
             updated_at = excluded.updated_at",
        params![
            user_id,
            stats.total_sessions,
            stats.total_time,
            stats.avg_good_posture,
            stats.weekly_goal,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("failed to write posture totals")?;
    Ok(())
}

impl Database {
    /// Stats for `user_id`; empty stats with the default goal if none exist.
    pub async fn load_stats(&self, user_id: &str) -> Result<UserPostureStats> {
        let user_id = user_id.to_string();
        self.execute(move |conn| load_stats(conn, &user_id)).await
    }

    /// Appends `session` to the user's history and rewrites the totals, all in
    /// one transaction. Returns the updated stats.
    pub async fn record_session(
        &self,
        user_id: &str,
        session: &Session,
    ) -> Result<UserPostureStats> {
        let user_id = user_id.to_string();
        let record = session.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let mut stats = load_stats(&tx, &user_id)?;

            let confidence_json = serde_json::to_string(&record.confidence)
                .context("failed to serialize confidence log")?;
            tx.execute(
                "INSERT INTO posture_sessions (id, user_id, started_at, duration_minutes, total_readings, good_readings, good_percentage, confidence_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    Uuid::new_v4().to_string(),
                    user_id,
                    record.timestamp.to_rfc3339(),
                    record.duration,
                    record.total_readings,
                    record.good_posture_readings,
                    record.good_posture_percentage,
                    confidence_json,
                ],
            )
            .context("failed to insert posture session")?;

            stats.record_session(record);
            write_totals(&tx, &user_id, &stats)?;

            tx.commit()?;
            Ok(stats)
        })
        .await
    }

    pub async fn set_weekly_goal(&self, user_id: &str, weekly_goal: f64) -> Result<()> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stats = load_stats(conn, &user_id)?;
            stats.weekly_goal = weekly_goal;
            write_totals(conn, &user_id, &stats)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{Duration, TimeZone};

    use super::*;

    fn session(minutes_after: i64, duration: u32, pct: f64) -> Session {
        Session {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
                + Duration::minutes(minutes_after),
            duration,
            total_readings: 50,
            good_posture_readings: (pct / 2.0) as u32,
            good_posture_percentage: pct,
            confidence: vec![0.9, 0.7],
        }
    }

    #[tokio::test]
    async fn unknown_user_has_empty_stats() {
        let db = Database::new(PathBuf::from(":memory:")).unwrap();
        let stats = db.load_stats("missing").await.unwrap();

        assert_eq!(stats, UserPostureStats::default());
    }

    #[tokio::test]
    async fn recorded_sessions_round_trip_in_order() {
        let db = Database::new(PathBuf::from(":memory:")).unwrap();
        let user = db.register_user("avery", "pw").await.unwrap();

        db.record_session(&user.id, &session(0, 2, 80.0)).await.unwrap();
        let after_second = db
            .record_session(&user.id, &session(30, 4, 40.0))
            .await
            .unwrap();

        assert_eq!(after_second.total_sessions, 2);
        assert_eq!(after_second.total_time, 6);
        assert!((after_second.avg_good_posture - 60.0).abs() < 1e-9);

        let loaded = db.load_stats(&user.id).await.unwrap();
        assert_eq!(loaded, after_second);
        assert_eq!(loaded.sessions[0].good_posture_percentage, 80.0);
        assert_eq!(loaded.sessions[1].confidence, vec![0.9, 0.7]);
    }

    #[tokio::test]
    async fn weekly_goal_is_kept_across_sessions() {
        let db = Database::new(PathBuf::from(":memory:")).unwrap();
        let user = db.register_user("avery", "pw").await.unwrap();

        db.set_weekly_goal(&user.id, 90.0).await.unwrap();
        let stats = db.record_session(&user.id, &session(0, 2, 70.0)).await.unwrap();

        assert_eq!(stats.weekly_goal, 90.0);
        assert_eq!(db.load_stats(&user.id).await.unwrap().weekly_goal, 90.0);
    }

    #[tokio::test]
    async fn session_for_unregistered_user_is_rejected() {
        let db = Database::new(PathBuf::from(":memory:")).unwrap();
        assert!(db.record_session("ghost", &session(0, 2, 70.0)).await.is_err());
        assert_eq!(db.load_stats("ghost").await.unwrap().total_sessions, 0);
    }
}
