use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::events::{AppEvent, EventBus};
use crate::metrics::{CycleMetrics, CycleOutcome, MetricsCollector};
use crate::model::PoseEstimator;
use crate::notify::Notifier;

use super::pipeline::PosturePipeline;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const ALERT_TITLE: &str = "Posture check";
const ALERT_BODY: &str = "You've been slouching for a while. Sit back and straighten up.";

/// Shared handles one detection cycle needs.
#[derive(Clone)]
pub struct LoopContext {
    pub estimator: Arc<dyn PoseEstimator>,
    pub pipeline: Arc<Mutex<PosturePipeline>>,
    pub notifier: Arc<Notifier>,
    pub events: EventBus,
    pub metrics: MetricsCollector,
}

/// Runs one detection cycle per tick until cancelled. A slow estimator delays
/// the next tick instead of queueing frames; cancellation is noticed between
/// cycles, never in the middle of one.
pub async fn detection_loop(ctx: LoopContext, interval: Duration, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!("detection loop started ({}ms interval)", interval.as_millis());

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("detection loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                run_cycle(&ctx).await;
            }
        }
    }
}

async fn run_cycle(ctx: &LoopContext) {
    let cycle_start = Instant::now();
    let timestamp = Utc::now();

    let estimator = Arc::clone(&ctx.estimator);
    let estimate = tokio::task::spawn_blocking(move || estimator.estimate())
        .await
        .context("estimator worker join failed")
        .and_then(|result| result);
    let inference_ms = cycle_start.elapsed().as_millis() as u64;

    let pipeline_start = Instant::now();
    let outcome = match estimate {
        Ok(Some(frame)) => {
            let processed = { ctx.pipeline.lock().await.process(&frame) };
            match processed {
                Ok(update) => {
                    let alert = update.alert;
                    ctx.events.emit(AppEvent::FrameProcessed(update));
                    if alert {
                        if let Err(err) = dispatch_alert(&ctx.notifier).await {
                            log_error!("posture alert dispatch failed: {err:?}");
                        }
                    }
                    CycleOutcome::Processed
                }
                Err(err) => {
                    log_warn!("classifier output rejected: {err}");
                    CycleOutcome::Failed
                }
            }
        }
        Ok(None) => {
            ctx.events.emit(AppEvent::NoSignal);
            CycleOutcome::NoSignal
        }
        Err(err) => {
            log_error!("pose estimation failed: {err:?}");
            CycleOutcome::Failed
        }
    };
    let pipeline_ms = pipeline_start.elapsed().as_millis() as u64;
    let total_ms = cycle_start.elapsed().as_millis() as u64;

    log_debug!(
        "cycle {:?} in {}ms (inference {}ms, pipeline {}ms)",
        outcome,
        total_ms,
        inference_ms,
        pipeline_ms
    );

    ctx.metrics
        .record_cycle(CycleMetrics {
            timestamp,
            outcome,
            inference_ms,
            pipeline_ms,
            total_ms,
        })
        .await;
}

async fn dispatch_alert(notifier: &Arc<Notifier>) -> Result<()> {
    let notifier = Arc::clone(notifier);
    let delivered = tokio::task::spawn_blocking(move || notifier.dispatch(ALERT_TITLE, ALERT_BODY))
        .await
        .context("notification worker join failed")?;
    if delivered {
        Ok(())
    } else {
        Err(anyhow!("no transport delivered the alert"))
    }
}
