use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dashboard::MonitorEvent;
use crate::metrics::{SharedHistory, TimeSeriesStore};
use crate::settings::SettingsStore;

use super::loop_worker::{publish, sampling_loop, LoopContext};
use super::sampler::Sampler;

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_SAMPLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum LoopState {
    #[default]
    Idle,
    Running,
}

/// Owns the sampling loop task: `Idle -> Running -> Idle`.
pub struct SamplingController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    sampler: Arc<Mutex<Sampler>>,
    settings: Arc<SettingsStore>,
    history: SharedHistory,
    events: UnboundedSender<MonitorEvent>,
    stop_timeout: Duration,
    sample_timeout: Duration,
    current_run: Arc<AtomicU64>,
}

impl SamplingController {
    pub fn new(
        sampler: Sampler,
        settings: Arc<SettingsStore>,
        events: UnboundedSender<MonitorEvent>,
    ) -> Self {
        Self {
            handle: None,
            cancel_token: None,
            sampler: Arc::new(Mutex::new(sampler)),
            settings,
            history: SharedHistory::new(TimeSeriesStore::new()),
            events,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            sample_timeout: DEFAULT_SAMPLE_TIMEOUT,
            current_run: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_sample_timeout(mut self, timeout: Duration) -> Self {
        self.sample_timeout = timeout;
        self
    }

    pub fn state(&self) -> LoopState {
        match &self.handle {
            Some(handle) if !handle.is_finished() => LoopState::Running,
            _ => LoopState::Idle,
        }
    }

    /// Series of the current (or most recent) run.
    pub fn history(&self) -> SharedHistory {
        self.history.clone()
    }

    /// Launches the loop. Returns `false` (and does nothing) when already running.
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> bool {
        if self.state() == LoopState::Running {
            return false;
        }

        // Each run owns its series. A run that outlived stop() can only ever
        // write into its own, so rates never span a stopped period.
        self.history = SharedHistory::new(TimeSeriesStore::new());
        let run = self.current_run.fetch_add(1, Ordering::SeqCst) + 1;

        let cancel_token = CancellationToken::new();
        let ctx = LoopContext {
            sampler: Arc::clone(&self.sampler),
            settings: Arc::clone(&self.settings),
            history: self.history.clone(),
            events: self.events.clone(),
            sample_timeout: self.sample_timeout,
            run,
            current_run: Arc::clone(&self.current_run),
        };

        self.handle = Some(tokio::spawn(sampling_loop(ctx, cancel_token.clone())));
        self.cancel_token = Some(cancel_token);

        info!("sampling started (run {run})");
        publish(
            &self.events,
            MonitorEvent::StateChanged {
                state: LoopState::Running,
            },
        );
        true
    }

    /// Signals cancellation and waits for the current iteration to finish, up to
    /// the stop timeout. Returns `false` when the loop was already idle.
    pub async fn stop(&mut self) -> bool {
        let token = self.cancel_token.take();
        let handle = self.handle.take();

        if let Some(token) = &token {
            token.cancel();
        }

        let Some(handle) = handle else {
            return false;
        };

        match tokio::time::timeout(self.stop_timeout, handle).await {
            Ok(Ok(())) => info!("sampling stopped"),
            Ok(Err(err)) => warn!("sampling loop task failed to join: {err}"),
            Err(_) => warn!(
                "sampling loop still finishing after {:?}; continuing without it",
                self.stop_timeout
            ),
        }

        publish(
            &self.events,
            MonitorEvent::StateChanged {
                state: LoopState::Idle,
            },
        );
        true
    }
}
