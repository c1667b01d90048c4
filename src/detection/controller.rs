use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::db::{Database, User};
use crate::events::{AppEvent, EventBus};
use crate::metrics::MetricsCollector;
use crate::model::PoseEstimator;
use crate::notify::Notifier;
use crate::posture::DetectionConfig;
use crate::session::{SessionEnd, TrackerSnapshot};
use crate::stats::{Session, UserPostureStats};

use super::loop_worker::{detection_loop, LoopContext};
use super::pipeline::PosturePipeline;

/// How stopping the camera resolved for the session that was running.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    NotRunning,
    TooShort { elapsed_ms: i64 },
    /// Nobody was signed in, so the session could not be attached to stats.
    NoUser(Session),
    Saved {
        session: Session,
        stats: UserPostureStats,
    },
}

struct DetectionWorker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns the detection loop and the session lifecycle around it.
#[derive(Clone)]
pub struct MonitorController {
    ctx: LoopContext,
    db: Database,
    interval: Duration,
    user: Arc<Mutex<Option<User>>>,
    worker: Arc<Mutex<Option<DetectionWorker>>>,
}

impl MonitorController {
    pub fn new(
        config: DetectionConfig,
        clock: Arc<dyn Clock>,
        estimator: Arc<dyn PoseEstimator>,
        notifier: Notifier,
        db: Database,
        events: EventBus,
    ) -> Self {
        let interval = Duration::from_millis(config.frame_interval_ms.max(1));
        Self {
            ctx: LoopContext {
                estimator,
                pipeline: Arc::new(Mutex::new(PosturePipeline::new(config, clock))),
                notifier: Arc::new(notifier),
                events,
                metrics: MetricsCollector::new(),
            },
            db,
            interval,
            user: Arc::new(Mutex::new(None)),
            worker: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn set_user(&self, user: Option<User>) {
        *self.user.lock().await = user;
    }

    pub async fn current_user(&self) -> Option<User> {
        self.user.lock().await.clone()
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.ctx.metrics
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    pub async fn snapshot(&self) -> TrackerSnapshot {
        self.ctx.pipeline.lock().await.session_snapshot()
    }

    /// Camera on: starts a session and the detection loop. Returns `None`
    /// (and changes nothing) when monitoring is already running.
    pub async fn start(&self) -> Result<Option<DateTime<Utc>>> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            warn!("Monitoring already active; start ignored");
            return Ok(None);
        }

        let Some(started_at) = self.ctx.pipeline.lock().await.start_session() else {
            return Ok(None);
        };
        self.ctx.metrics.reset().await;
        self.ctx.events.emit(AppEvent::SessionStarted { started_at });

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(detection_loop(
            self.ctx.clone(),
            self.interval,
            cancel_token.clone(),
        ));
        *worker = Some(DetectionWorker {
            handle,
            cancel_token,
        });

        Ok(Some(started_at))
    }

    /// Camera off: stops scheduling cycles, waits for the in-flight one, then
    /// finalizes the session against the signed-in user.
    pub async fn stop(&self) -> Result<StopOutcome> {
        if let Some(worker) = self.worker.lock().await.take() {
            worker.cancel_token.cancel();
            worker
                .handle
                .await
                .context("detection loop task failed to join")?;
        }

        let ended = self.ctx.pipeline.lock().await.end_session();
        let session = match ended {
            SessionEnd::NotActive => return Ok(StopOutcome::NotRunning),
            SessionEnd::Discarded { elapsed_ms } => {
                self.ctx.events.emit(AppEvent::SessionDiscarded {
                    reason: format!("session lasted {}s, under a minute", elapsed_ms / 1000),
                });
                return Ok(StopOutcome::TooShort { elapsed_ms });
            }
            SessionEnd::Finished(session) => session,
        };

        let Some(user) = self.current_user().await else {
            warn!(
                "No signed-in user; dropping {} minute posture session",
                session.duration
            );
            self.ctx.events.emit(AppEvent::SessionDiscarded {
                reason: "no signed-in user".to_string(),
            });
            return Ok(StopOutcome::NoUser(session));
        };

        let stats = self
            .db
            .record_session(&user.id, &session)
            .await
            .with_context(|| format!("failed to save posture session for {}", user.username))?;
        info!(
            "Saved posture session for {}: {} sessions, {} min total, {:.1}% average",
            user.username, stats.total_sessions, stats.total_time, stats.avg_good_posture
        );

        self.ctx.events.emit(AppEvent::SessionCompleted {
            user_id: user.id.clone(),
            session: session.clone(),
        });

        Ok(StopOutcome::Saved { session, stats })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;

    use anyhow::bail;
    use chrono::TimeZone;
    use tokio::sync::broadcast;
    use tokio::time::timeout;

    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::InAppTransport;
    use crate::posture::PoseFrame;

    enum Scripted {
        Frame(&'static str, f64),
        Nobody,
        Fail,
    }

    struct ScriptedEstimator {
        script: StdMutex<VecDeque<Scripted>>,
    }

    impl ScriptedEstimator {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: StdMutex::new(script.into()),
            }
        }
    }

    impl PoseEstimator for ScriptedEstimator {
        fn estimate(&self) -> Result<Option<PoseFrame>> {
            match self.script.lock().unwrap().pop_front() {
                Some(Scripted::Frame(class, confidence)) => Ok(Some(PoseFrame {
                    keypoints: Vec::new(),
                    class_label: class.to_string(),
                    confidence,
                })),
                Some(Scripted::Fail) => bail!("inference rejected"),
                Some(Scripted::Nobody) | None => Ok(None),
            }
        }
    }

    struct Harness {
        controller: MonitorController,
        clock: ManualClock,
        events: broadcast::Receiver<AppEvent>,
        db: Database,
    }

    fn harness(script: Vec<Scripted>) -> Harness {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
        let events = EventBus::new();
        let receiver = events.subscribe();
        let db = Database::new(PathBuf::from(":memory:")).unwrap();
        let config = DetectionConfig {
            smoothing_window: 3,
            frame_interval_ms: 1,
            ..DetectionConfig::default()
        };
        let controller = MonitorController::new(
            config,
            Arc::new(clock.clone()),
            Arc::new(ScriptedEstimator::new(script)),
            Notifier::new(vec![Box::new(InAppTransport::new(events.clone()))]),
            db.clone(),
            events,
        );
        Harness {
            controller,
            clock,
            events: receiver,
            db,
        }
    }

    /// Collects events until `count` frames (processed or empty) have been seen.
    async fn drain_frames(events: &mut broadcast::Receiver<AppEvent>, count: usize) -> Vec<AppEvent> {
        let mut seen = Vec::new();
        let mut frames = 0;
        while frames < count {
            let event = match timeout(std::time::Duration::from_secs(5), events.recv())
                .await
                .expect("timed out waiting for frames")
            {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            };
            if matches!(event, AppEvent::FrameProcessed(_) | AppEvent::NoSignal) {
                frames += 1;
            }
            seen.push(event);
        }
        seen
    }

    #[tokio::test]
    async fn saves_session_for_signed_in_user() {
        let mut h = harness(vec![
            Scripted::Frame("good", 0.9),
            Scripted::Frame("good", 0.9),
            Scripted::Fail,
            Scripted::Frame("good", 0.9),
            Scripted::Frame("bad", 0.9),
        ]);
        let user = h.db.register_user("avery", "pw").await.unwrap();
        h.controller.set_user(Some(user.clone())).await;

        assert!(h.controller.start().await.unwrap().is_some());
        assert!(h.controller.start().await.unwrap().is_none());
        drain_frames(&mut h.events, 6).await;
        h.clock.advance_ms(2 * 60_000);

        let (session, stats) = match h.controller.stop().await.unwrap() {
            StopOutcome::Saved { session, stats } => (session, stats),
            other => panic!("expected saved session, got {other:?}"),
        };
        assert_eq!(session.duration, 2);
        assert_eq!(session.total_readings, 4);
        assert_eq!(session.good_posture_readings, 4);
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.total_time, 2);
        assert!(!h.controller.is_running().await);

        let stored = h.db.load_stats(&user.id).await.unwrap();
        assert_eq!(stored.sessions, vec![session]);

        let metrics = h.controller.metrics().snapshot().await;
        assert!(metrics.failure_count >= 1);
    }

    #[tokio::test]
    async fn short_session_is_discarded() {
        let mut h = harness(vec![Scripted::Frame("good", 0.9)]);
        let user = h.db.register_user("avery", "pw").await.unwrap();
        h.controller.set_user(Some(user.clone())).await;

        h.controller.start().await.unwrap();
        drain_frames(&mut h.events, 1).await;
        h.clock.advance_ms(45_000);

        assert_eq!(
            h.controller.stop().await.unwrap(),
            StopOutcome::TooShort { elapsed_ms: 45_000 }
        );
        assert_eq!(h.db.load_stats(&user.id).await.unwrap().total_sessions, 0);
    }

    #[tokio::test]
    async fn session_without_user_is_not_saved() {
        let mut h = harness(vec![Scripted::Frame("good", 0.9), Scripted::Nobody]);

        h.controller.start().await.unwrap();
        drain_frames(&mut h.events, 2).await;
        h.clock.advance_ms(5 * 60_000);

        match h.controller.stop().await.unwrap() {
            StopOutcome::NoUser(session) => assert_eq!(session.duration, 5),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn sustained_slouch_raises_in_app_alert() {
        let mut h = harness(vec![
            Scripted::Frame("bad", 0.9),
            Scripted::Frame("bad", 0.9),
            Scripted::Frame("bad", 0.9),
        ]);

        h.controller.start().await.unwrap();
        let seen = drain_frames(&mut h.events, 3).await;
        h.controller.stop().await.unwrap();

        let mut remaining = Vec::new();
        while let Ok(event) = h.events.try_recv() {
            remaining.push(event);
        }
        let alerts = seen
            .iter()
            .chain(remaining.iter())
            .filter(|e| matches!(e, AppEvent::PostureAlert { .. }))
            .count();
        assert_eq!(alerts, 1);
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let h = harness(Vec::new());
        assert_eq!(h.controller.stop().await.unwrap(), StopOutcome::NotRunning);
    }
}
