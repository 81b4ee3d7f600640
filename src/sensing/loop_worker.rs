use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::dashboard::{FailureEvent, MonitorEvent, ReadingEvent};
use crate::metrics::{self, SharedHistory};
use crate::settings::{MonitorSettings, SettingsStore, MIN_CAPTURE_INTERVAL_SECS};

use super::sampler::{CapturePlan, Reading, SampleError, Sampler};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Everything one run of the sampling loop works with.
pub(crate) struct LoopContext {
    pub sampler: Arc<Mutex<Sampler>>,
    pub settings: Arc<SettingsStore>,
    pub history: SharedHistory,
    pub events: UnboundedSender<MonitorEvent>,
    pub sample_timeout: Duration,
    /// Id of this run, and the id of the run the controller currently owns.
    pub run: u64,
    pub current_run: Arc<AtomicU64>,
}

impl LoopContext {
    /// False once `start()` has launched a newer run.
    fn is_current(&self) -> bool {
        self.current_run.load(Ordering::SeqCst) == self.run
    }
}

type SampleTask = JoinHandle<Result<Reading, SampleError>>;

pub(crate) async fn sampling_loop(ctx: LoopContext, cancel_token: CancellationToken) {
    log_info!("sampling loop started");

    // A capture that outlived its timeout; the next iteration waits on it
    // instead of starting a second call on the same backend.
    let mut in_flight: Option<SampleTask> = None;

    while !cancel_token.is_cancelled() {
        let settings = ctx.settings.snapshot();
        let started = Instant::now();

        let outcome = sample_once(&ctx, settings.capture_plan(), &mut in_flight).await;
        if !ctx.is_current() {
            // Stop gave up waiting on this run and a new one has started.
            log_debug!("discarding sample from superseded run {}", ctx.run);
            break;
        }
        handle_outcome(&ctx, &settings, outcome);
        log_debug!("sampling iteration took {}ms", started.elapsed().as_millis());

        if cancel_token.is_cancelled() {
            break;
        }

        let interval = ctx
            .settings
            .snapshot()
            .capture_interval
            .max(MIN_CAPTURE_INTERVAL_SECS);

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs_f64(interval)) => {}
        }
    }

    log_info!("sampling loop shutting down");
}

async fn sample_once(
    ctx: &LoopContext,
    plan: CapturePlan,
    in_flight: &mut Option<SampleTask>,
) -> Result<Reading, SampleError> {
    let mut task = match in_flight.take() {
        Some(task) => task,
        None => {
            let sampler = Arc::clone(&ctx.sampler);
            tokio::task::spawn_blocking(move || {
                let mut sampler = sampler.lock().unwrap_or_else(PoisonError::into_inner);
                sampler.sample(&plan)
            })
        }
    };

    match tokio::time::timeout(ctx.sample_timeout, &mut task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => Err(SampleError::Worker(join_err.to_string())),
        Err(_) => {
            *in_flight = Some(task);
            Err(SampleError::Timeout(ctx.sample_timeout))
        }
    }
}

fn handle_outcome(
    ctx: &LoopContext,
    settings: &MonitorSettings,
    outcome: Result<Reading, SampleError>,
) {
    match outcome {
        Ok(reading) => {
            let snapshot = {
                let mut store = ctx.history.lock();
                store.append(reading.sample);
                metrics::snapshot(&store, settings.gold_history_window)
            };

            let time_to_target_minutes = settings.target_upgrade_cost.and_then(|target| {
                metrics::time_to_target_minutes(reading.sample.value, target, snapshot.current_rate())
            });

            log_debug!(
                "sampled {} (rate {:.2}/min, text {:?})",
                reading.sample.value,
                snapshot.current_rate(),
                reading.text
            );

            publish(
                &ctx.events,
                MonitorEvent::Reading(ReadingEvent {
                    sample: reading.sample,
                    text: reading.text,
                    snapshot,
                    time_to_target_minutes,
                    timestamp: Utc::now(),
                }),
            );
        }
        Err(err) => {
            log_warn!("sample failed ({}): {err}", err.kind());
            publish(
                &ctx.events,
                MonitorEvent::Failure(FailureEvent {
                    kind: err.kind(),
                    reason: err.to_string(),
                    timestamp: Utc::now(),
                }),
            );
        }
    }
}

pub(crate) fn publish(events: &UnboundedSender<MonitorEvent>, event: MonitorEvent) {
    if events.send(event).is_err() {
        log_debug!("dashboard receiver dropped; event discarded");
    }
}
