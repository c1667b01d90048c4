pub mod models;
pub mod progress;

pub use models::{Session, UserPostureStats, DEFAULT_WEEKLY_GOAL};
pub use progress::{
    daily_averages, improvement, insights, recent_sessions, DailyAverage, Insight, InsightKind,
    ProgressReport,
};
